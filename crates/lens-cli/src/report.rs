//! Output formatting for extraction results.

use lens_core::{DecodedProgram, Feature, LabeledFeatures, OpcodeHistogram, RiskScore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Jsonl,
    Text,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "jsonl" => Ok(OutputFormat::Jsonl),
            "text" => Ok(OutputFormat::Text),
            _ => Err(format!("Unknown format: {s}. Use 'json', 'jsonl' or 'text'.")),
        }
    }
}

pub fn print_features(rows: &[LabeledFeatures<String>], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(rows),
        OutputFormat::Jsonl => print_jsonl(rows),
        OutputFormat::Text => print_text(rows),
    }
}

fn print_json(rows: &[LabeledFeatures<String>]) {
    println!("{}", serde_json::to_string_pretty(rows).unwrap_or_default());
}

fn print_jsonl(rows: &[LabeledFeatures<String>]) {
    for row in rows {
        println!("{}", serde_json::to_string(row).unwrap_or_default());
    }
}

fn print_text(rows: &[LabeledFeatures<String>]) {
    for row in rows {
        let fv = &row.features;
        let risk = RiskScore::from_features(fv);

        println!("{}", "=".repeat(70));
        println!("{}", row.label);
        println!("{}", "=".repeat(70));
        println!(
            "  instructions: {}  unique: {}  entropy: {:.4}",
            fv[Feature::TotalInstructions],
            fv[Feature::UniqueInstructions],
            fv[Feature::OpcodeEntropy]
        );
        println!(
            "  risk: reentrancy {:.4}  frontrunning {:.4}  dos {:.4}  arithmetic {:.4}  overall {:.4}",
            risk.reentrancy, risk.frontrunning, risk.dos, risk.arithmetic, risk.overall
        );

        let raised: Vec<&str> = [
            Feature::HasReentrancyIndicators,
            Feature::HasUncheckedExternalCalls,
            Feature::HasArithmeticVulnerabilities,
            Feature::HasAccessControlIssues,
            Feature::HasDosVulnerabilities,
        ]
        .into_iter()
        .filter(|&f| fv[f] > 0.0)
        .map(|f| f.name())
        .collect();
        if raised.is_empty() {
            println!("  indicators: none");
        } else {
            println!("  indicators: {}", raised.join(", "));
        }

        for (name, value) in fv.iter() {
            println!("    {:<34} {}", name, value);
        }
    }
}

pub fn print_listing(label: &str, program: &DecodedProgram) {
    println!("; {} ({} instructions)", label, program.len());
    for insn in program.iter() {
        println!("{:06X}  {:02X}  {}", insn.pc, insn.opcode, insn.text());
    }
    if let Some(stop) = &program.stop {
        println!("; stopped: {}", stop);
    }
    println!();
}

pub fn print_summary(samples: usize, hist: &OpcodeHistogram, top: usize, format: OutputFormat) {
    let most_common = hist.most_common(top);

    match format {
        OutputFormat::Text => {
            println!("SUMMARY");
            println!("  Samples:       {}", samples);
            println!("  Instructions:  {}", hist.total);
            println!("  Distinct ops:  {}", hist.unique());
            println!("  Entropy:       {:.4}", hist.entropy());
            println!("\nTOP {} MNEMONICS:", most_common.len());
            for (mnemonic, count) in &most_common {
                let share = *count as f64 / hist.total.max(1) as f64 * 100.0;
                println!("  {:<14} {:>10}  {:>6.2}%", mnemonic, count, share);
            }
        }
        OutputFormat::Json | OutputFormat::Jsonl => {
            let output = serde_json::json!({
                "samples": samples,
                "instructions": hist.total,
                "unique": hist.unique(),
                "entropy": hist.entropy(),
                "most_common": most_common
                    .iter()
                    .map(|(m, c)| serde_json::json!({ "mnemonic": m, "count": c }))
                    .collect::<Vec<_>>(),
            });
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
            } else {
                println!("{}", serde_json::to_string(&output).unwrap_or_default());
            }
        }
    }
}
