//! Bitcoin Custody Pod CLI
//!
//! Run modes:
//!   cargo run                          - Show usage
//!   cargo run -- demo [amount]         - Full pod lifecycle against in-memory registries
//!   cargo run -- address <script-hex>  - P2WSH address of a redeem script
//!   cargo run -- psbt <base64|hex>     - List the outputs of a PSBT
//!   cargo run -- psbt --file <path>    - Same, for a PSBT file (binary or text)
//!   cargo run -- config                - Print the configuration summary

use base64::Engine;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::{
    absolute::LockTime, transaction::Version, Amount, OutPoint, Psbt, ScriptBuf, Sequence,
    Transaction, TxIn, TxOut, Witness,
};
use sha2::{Digest, Sha256};
use std::env;
use std::path::Path;
use std::sync::Arc;

use btcpod::codec::{extract_two_public_keys, script_pubkey_to_witness_program, PSBT_MAGIC};
use btcpod::common::{init_from_config, PodConfig, PodProtocolError};
use btcpod::types::{parse_sats, sats_to_display};
use btcpod::{
    build_multisig_script, parse_psbt_outputs, script_pubkey_to_bech32, script_to_script_pubkey,
    AccountId, PodManager, StaticAppRegistry, StaticOperatorRegistry,
};

const DEFAULT_DEMO_AMOUNT: u64 = 500_000;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let config = match PodConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_from_config(&config) {
        eprintln!("Warning: {}", e);
    }

    let result = match args[1].as_str() {
        "demo" => run_demo(config, &args[2..]).await,
        "address" => run_address(&config, &args[2..]),
        "psbt" => run_psbt(&args[2..]),
        "config" => {
            config.print_summary();
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error [{}]: {}", e.error_code(), e);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Bitcoin Custody Pod CLI");
    println!();
    println!("Usage:");
    println!("  btc-pod demo [amount]          Run the full pod lifecycle in memory (default 500,000 sats)");
    println!("  btc-pod address <script-hex>   Derive the P2WSH address of a redeem script");
    println!("  btc-pod psbt <base64|hex>      List PSBT outputs");
    println!("  btc-pod psbt --file <path>     List outputs of a PSBT file");
    println!("  btc-pod config                 Print configuration");
    println!();
    println!("Environment Variables:");
    println!("  BTCPOD_NETWORK          mainnet, testnet, signet or regtest (default: regtest)");
    println!("  BTCPOD_ADMIN            Administrator identity");
    println!("  BTCPOD_SERVICE_MANAGER  Signature-verification service identity");
    println!("  BTCPOD_MANAGER_ID       Identity the manager presents to pods");
    println!("  BTCPOD_EVENT_CAPACITY   Event channel capacity (default: 1024)");
    println!("  BTCPOD_LOG_LEVEL        Log level (default: info)");
}

/// Print the P2WSH address for a redeem script
fn run_address(config: &PodConfig, args: &[String]) -> Result<(), PodProtocolError> {
    let script_hex = args
        .first()
        .ok_or_else(|| PodProtocolError::validation("usage: btc-pod address <script-hex>"))?;
    let script = hex::decode(script_hex.trim())
        .map_err(|e| PodProtocolError::validation(format!("invalid script hex: {}", e)))?;

    let script_pubkey = script_to_script_pubkey(&script);
    let address = script_pubkey_to_bech32(&script_pubkey, config.network.bech32_hrp())?;
    let program = script_pubkey_to_witness_program(&script_pubkey)?;

    println!("Network:         {}", config.network);
    println!("Witness program: {}", hex::encode(program));
    println!("scriptPubKey:    {}", hex::encode(script_pubkey));
    println!("Address:         {}", address);

    if let Ok((first, second)) = extract_two_public_keys(&script) {
        println!("2-of-2 key 1:    {}", hex::encode(first));
        println!("2-of-2 key 2:    {}", hex::encode(second));
    }

    Ok(())
}

/// Decode PSBT text given as hex or base64
fn decode_psbt_text(input: &str) -> Result<Vec<u8>, PodProtocolError> {
    let input = input.trim();
    if input.len() % 2 == 0 && input.bytes().all(|b| b.is_ascii_hexdigit()) {
        hex::decode(input).map_err(|e| PodProtocolError::validation(e.to_string()))
    } else {
        base64::engine::general_purpose::STANDARD
            .decode(input)
            .map_err(|e| PodProtocolError::validation(format!("invalid base64: {}", e)))
    }
}

/// Read a PSBT file, raw (as written by wallets) or as hex/base64 text
fn read_psbt_file(path: &Path) -> Result<Vec<u8>, PodProtocolError> {
    let bytes = std::fs::read(path)?;
    if bytes.starts_with(&PSBT_MAGIC) {
        return Ok(bytes);
    }
    let text = String::from_utf8(bytes)
        .map_err(|_| PodProtocolError::validation("PSBT file is neither binary nor text"))?;
    decode_psbt_text(&text)
}

/// List the outputs of a PSBT
fn run_psbt(args: &[String]) -> Result<(), PodProtocolError> {
    let usage = || PodProtocolError::validation("usage: btc-pod psbt <base64|hex> | --file <path>");
    let bytes = match args.first().map(String::as_str) {
        Some("--file") => read_psbt_file(Path::new(args.get(1).ok_or_else(usage)?))?,
        Some(input) => decode_psbt_text(input)?,
        None => return Err(usage()),
    };

    let outputs = parse_psbt_outputs(&bytes)?;
    println!("{} output(s)", outputs.len());
    for (i, output) in outputs.iter().enumerate() {
        println!(
            "  #{}: {} -> {}",
            i,
            sats_to_display(output.value),
            hex::encode(&output.script_pubkey)
        );
    }

    Ok(())
}

/// Deposit amount for the demo, from the optional first argument
fn demo_amount(args: &[String]) -> Result<u64, PodProtocolError> {
    match args.first() {
        None => Ok(DEFAULT_DEMO_AMOUNT),
        Some(arg) => match parse_sats(arg) {
            Some(0) | None => Err(PodProtocolError::validation(format!(
                "invalid amount {:?}: expected a positive number of sats",
                arg
            ))),
            Some(amount) => Ok(amount),
        },
    }
}

/// Deterministic demo key from a label
fn demo_key(label: &str) -> Result<[u8; 33], PodProtocolError> {
    let secp = Secp256k1::new();
    let secret = SecretKey::from_slice(&Sha256::digest(label.as_bytes()))
        .map_err(|e| PodProtocolError::validation(e.to_string()))?;
    Ok(PublicKey::from_secret_key(&secp, &secret).serialize())
}

/// Unsigned transaction paying `value` to `script_pubkey`, wrapped in a PSBT
fn demo_psbt(script_pubkey: &[u8], value: u64) -> Result<Vec<u8>, PodProtocolError> {
    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(value),
            script_pubkey: ScriptBuf::from_bytes(script_pubkey.to_vec()),
        }],
    };

    let psbt = Psbt::from_unsigned_tx(tx).map_err(|e| PodProtocolError::validation(e.to_string()))?;
    Ok(psbt.serialize())
}

async fn run_demo(config: PodConfig, args: &[String]) -> Result<(), PodProtocolError> {
    let amount = demo_amount(args)?;
    println!("\n=== Bitcoin Custody Pod Demo ===\n");

    let hrp = config.network.bech32_hrp();
    let service_manager = config.service_manager.clone();

    let owner = AccountId::from("alice");
    let operator = AccountId::from("operator-1");
    let app = AccountId::from("lending-app");

    let owner_key = demo_key("demo owner")?;
    let operator_key = demo_key("demo operator")?;

    let operators = StaticOperatorRegistry::new().with_operator(operator.clone(), operator_key.to_vec());
    let apps = StaticAppRegistry::new().with_app(app.clone());
    let mut manager = PodManager::in_memory(config, Arc::new(operators), Arc::new(apps));

    // Value-accounting collaborator stand-in
    let mut events = manager.subscribe();
    let listener = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => println!("  [event] {}", json),
                Err(e) => eprintln!("  [event] unserializable: {}", e),
            }
        }
    });

    // 1. Pod creation
    let script = build_multisig_script(&owner_key, &operator_key);
    let address = script_pubkey_to_bech32(&script_to_script_pubkey(&script), hrp)?;
    println!("1. Custody address: {}", address);
    let pod_id = manager.create_pod(&owner, &operator, &address, &script)?;
    println!("   Pod created: {}", pod_id);

    // 2. Deposit
    let tx_id: [u8; 32] = Sha256::digest(b"demo deposit").into();
    println!("2. Deposit of {}", sats_to_display(amount));
    manager.verify_bitcoin_deposit_request(&owner, &pod_id, tx_id, amount)?;
    manager.confirm_bitcoin_deposit(&service_manager, &operator, &pod_id, tx_id, amount)?;
    println!("   Balance: {}", sats_to_display(manager.pod(&pod_id)?.balance()));

    // 3. Delegation round trip
    println!("3. Delegating to {}", app);
    manager.delegate_pod(&owner, &pod_id, &app)?;
    manager.lock_pod(&app, &pod_id)?;
    manager.unlock_pod(&app, &pod_id)?;
    manager.undelegate_pod(&owner, &pod_id)?;

    // 4. Withdrawal
    let withdraw_script = build_multisig_script(&demo_key("demo cold 1")?, &demo_key("demo cold 2")?);
    let withdraw_spk = script_to_script_pubkey(&withdraw_script);
    let withdraw_address = script_pubkey_to_bech32(&withdraw_spk, hrp)?;
    println!("4. Withdrawing to {}", withdraw_address);
    manager.withdraw_bitcoin_psbt_request(&owner, &pod_id, &withdraw_address)?;

    let signed = demo_psbt(&withdraw_spk, amount)?;
    manager.withdraw_bitcoin_psbt(&service_manager, &operator, &pod_id, signed)?;
    println!(
        "   Signed PSBT stored ({} bytes)",
        manager.signed_withdraw_transaction(&pod_id)?.map(|b| b.len()).unwrap_or(0)
    );

    manager.withdraw_bitcoin_as_tokens(&service_manager, &operator, &pod_id)?;
    let pod = manager.pod(&pod_id)?;
    println!(
        "   Settled: balance {}, state {}, locked {}",
        sats_to_display(pod.balance()),
        pod.state(),
        pod.is_locked()
    );
    println!("   Total value locked: {}", sats_to_display(manager.total_tvl()));

    drop(manager);
    if let Err(e) = listener.await {
        eprintln!("Event listener failed: {}", e);
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
