pub mod bench_cmd;
pub mod dump_cmd;
pub mod lookup_cmd;
pub mod meta_cmd;

pub use bench_cmd::cmd_bench;
pub use dump_cmd::cmd_dump;
pub use lookup_cmd::cmd_lookup;
pub use meta_cmd::cmd_meta;
