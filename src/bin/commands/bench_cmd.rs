use anyhow::{Context, Result};
use rand::Rng;
use rayon::prelude::*;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Instant;

use crate::cli_utils::{format_number, format_qps, open_database, parse_ip};

pub fn cmd_bench(
    database: PathBuf,
    ip: Option<String>,
    count: usize,
    threads: Option<usize>,
) -> Result<bool> {
    let db = open_database(&database)?;

    let addrs: Vec<IpAddr> = match ip {
        Some(ip) => vec![parse_ip(&ip)?; count],
        None => {
            let mut rng = rand::rng();
            (0..count)
                .map(|_| IpAddr::V4(Ipv4Addr::from(rng.random::<u32>())))
                .collect()
        }
    };

    // 0 lets rayon pick one thread per core
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.unwrap_or(0))
        .build()
        .context("Failed to start worker threads")?;

    let start = Instant::now();
    let found = pool.install(|| {
        addrs
            .par_iter()
            .map(|&addr| -> tinymmdb::Result<usize> {
                let result = db.lookup(addr)?;
                match result.entry() {
                    Some(entry) => {
                        entry.get_tree()?;
                        Ok(1)
                    }
                    None => Ok(0),
                }
            })
            .try_reduce(|| 0, |a, b| Ok(a + b))
    })?;
    let elapsed = start.elapsed().as_secs_f64();
    let reqs_sec = if elapsed > 0.0 {
        count as f64 / elapsed
    } else {
        0.0
    };

    println!("Lookups:   {}", format_number(count));
    println!("Found:     {}", format_number(found));
    println!("Threads:   {}", pool.current_num_threads());
    println!("Elapsed:   {:.3}s", elapsed);
    println!("Rate:      {} lookups/sec", format_qps(reqs_sec));
    println!("reqs/sec {:.2}", reqs_sec);

    Ok(true)
}
