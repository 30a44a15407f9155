use std::time::Instant;

use clap::Parser;
use ssh_kex::{
    KexAlgorithm, KexError, KeyExchange, KeyLengths, KeyRole,
    utils::{bytes_to_hex_string, encode_string},
};

#[derive(Parser, Debug)]
#[command(
    name = "ssh-kex",
    about = "SSH key exchange benchmark",
    version,
    rename_all = "kebab-case"
)]
pub struct BenchmarkCmd {
    /// Key exchange method to run; all supported methods when omitted
    #[arg(short = 'a', long = "algorithm")]
    algorithm: Option<KexAlgorithm>,
    /// Number of exchanges per method
    #[arg(short = 'i', long = "iterations", default_value = "10")]
    iterations: usize,
    /// Length of the derived IVs in bytes
    #[arg(long = "iv-len", default_value = "16")]
    iv_len: usize,
    /// Length of the derived encryption keys in bytes
    #[arg(long = "key-len", default_value = "32")]
    key_len: usize,
    /// Length of the derived integrity keys in bytes
    #[arg(long = "mac-len", default_value = "32")]
    mac_len: usize,
    /// Print the public values and keys of the first exchange
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

fn main() {
    let args = BenchmarkCmd::parse();
    let algorithms = match args.algorithm {
        Some(algorithm) => vec![algorithm],
        None => KexAlgorithm::ALL.to_vec(),
    };
    let lengths = KeyLengths::symmetric(args.iv_len, args.key_len, args.mac_len);

    for algorithm in algorithms {
        if let Err(err) = benchmark_exchange(algorithm, args.iterations, &lengths, args.verbose) {
            eprintln!("{algorithm} failed: {err}");
            std::process::exit(1);
        }
    }
    println!("Benchmark completed successfully");
}

/// Runs `iterations` complete exchanges between two local parties and reports the average time of
/// each phase.
pub fn benchmark_exchange(
    algorithm: KexAlgorithm,
    iterations: usize,
    lengths: &KeyLengths,
    verbose: bool,
) -> Result<(), KexError> {
    println!("Running {iterations} exchanges with {algorithm} ({}):", algorithm.hash_algorithm());

    let mut keygen_times = Vec::with_capacity(iterations);
    let mut agreement_times = Vec::with_capacity(iterations);
    let mut derivation_times = Vec::with_capacity(iterations);

    for i in 0..iterations {
        let now = Instant::now();
        let mut client = KeyExchange::new(algorithm)?;
        let mut server = KeyExchange::new(algorithm)?;
        keygen_times.push(now.elapsed().as_micros() / 2);

        let e = client.public_value().to_vec();
        let f = server.public_value().to_vec();

        let now = Instant::now();
        server.compute_shared_secret_from_wire(&e)?;
        client.compute_shared_secret_from_wire(&f)?;
        agreement_times.push(now.elapsed().as_micros() / 2);

        let client_k = client.shared_secret().ok_or(KexError::SharedSecretNotComputed)?;
        let server_k = server.shared_secret().ok_or(KexError::SharedSecretNotComputed)?;
        assert_eq!(client_k.as_bytes(), server_k.as_bytes(), "parties disagree on the secret");
        let k = client_k.as_bytes().to_vec();

        // stand-in for the host key and KEXINIT parts of the real exchange hash
        let transcript = encode_string(format!("ssh-kex benchmark {i}").as_bytes())?;
        let h = client.hash_parts(&[&transcript, &e, &f, &k]);

        let now = Instant::now();
        let client_keys = client.derive_session_keys(&h, &h, lengths)?;
        derivation_times.push(now.elapsed().as_micros());
        let server_keys = server.derive_session_keys(&h, &h, lengths)?;

        for role in KeyRole::ALL {
            assert_eq!(client_keys.get(role), server_keys.get(role), "disagree on {role:?}");
        }

        if verbose && i == 0 {
            println!("  e = {}", bytes_to_hex_string(&e));
            println!("  f = {}", bytes_to_hex_string(&f));
            println!("  H = {}", bytes_to_hex_string(&h));
            for role in KeyRole::ALL {
                println!("  {role:?} = {}", bytes_to_hex_string(client_keys.get(role)));
            }
        }
    }

    println!("  key pair generation: {:.0} μs", average(&keygen_times));
    println!("  shared secret:       {:.0} μs", average(&agreement_times));
    println!("  session keys:        {:.0} μs\n", average(&derivation_times));

    Ok(())
}

fn average(times: &[u128]) -> f64 {
    if times.is_empty() {
        return 0.0;
    }
    times.iter().sum::<u128>() as f64 / times.len() as f64
}
