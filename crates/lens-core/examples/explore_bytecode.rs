//! Example: decode one contract and print its listing, top mnemonics and risk scores.
//!
//! Usage:
//!   cargo run -p lens-core --example explore_bytecode -- 0x6080604052348015600f57600080fd5b
//!   cargo run -p lens-core --example explore_bytecode -- path/to/contract.bin

use std::path::Path;

use lens_core::{Feature, FeatureExtractor, MappedFile, OpcodeHistogram};

fn main() -> anyhow::Result<()> {
    let Some(input) = std::env::args().nth(1) else {
        eprintln!("Usage: explore_bytecode <0xHEX | path>");
        std::process::exit(1);
    };

    let mapped;
    let code: Vec<u8> = if input.starts_with("0x") || input.starts_with("0X") {
        lens_core::parse_hex(&input)
    } else {
        mapped = MappedFile::open(Path::new(&input))?;
        match mapped.hex_corpus() {
            Some(text) => lens_core::mapped_file::hex_lines(text)
                .next()
                .map(|(_, line)| lens_core::parse_hex(line))
                .unwrap_or_default(),
            None => mapped.bytes().to_vec(),
        }
    };

    let extractor = FeatureExtractor::default();
    let program = extractor.decode(&code);

    println!("=== {} bytes, {} instructions ===", code.len(), program.len());
    if let Some(stop) = &program.stop {
        println!("Decoding stopped: {}", stop);
    }
    println!();

    println!("--- Listing (first 32) ---");
    for insn in program.iter().take(32) {
        println!("  {:06X}  {}", insn.pc, insn.text());
    }
    println!();

    println!("--- Top mnemonics ---");
    let hist = OpcodeHistogram::from_program(&program);
    for (mnemonic, count) in hist.most_common(8) {
        println!("  {:<14} {:>6}", mnemonic, count);
    }
    println!();

    let analysis = extractor.analyze_program(&program);
    println!("--- Risk ---");
    println!("  reentrancy    {:.4}", analysis.risk.reentrancy);
    println!("  frontrunning  {:.4}", analysis.risk.frontrunning);
    println!("  dos           {:.4}", analysis.risk.dos);
    println!("  arithmetic    {:.4}", analysis.risk.arithmetic);
    println!("  overall       {:.4}", analysis.risk.overall);
    println!("  indicators    {}/5", analysis.risk.indicators.raised());
    println!(
        "  entropy       {:.4} nats",
        analysis.features[Feature::OpcodeEntropy]
    );

    Ok(())
}
