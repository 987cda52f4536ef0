/// Console summary of an analysis run

use colored::Colorize;
use ferret_core::{token_label, Classification};
use std::path::PathBuf;

use crate::core::{AnalysisReport, FlaggedWallet};

const TOP_WALLETS: usize = 10;

pub fn print_banner(target_wallet: &str) {
    println!("\n{}", "🦦 FERRET - KOL Coordination Analysis".bold());
    println!("{}", "=".repeat(70));
    println!("   Target: {}", target_wallet.cyan());
}

pub fn print_summary(report: &AnalysisReport) {
    println!("\n{}", "📊 ANALYSIS SUMMARY".bold());
    println!("{}", "=".repeat(70));
    println!("   Target purchases:     {}", report.target_purchases.len());
    println!(
        "   Candidates evaluated: {}{}",
        report.candidates_total,
        if report.candidates_resumed > 0 {
            format!(" ({} from checkpoint)", report.candidates_resumed)
        } else {
            String::new()
        }
    );
    println!(
        "   Baseline overlap:     mean {:.1}%  median {:.1}%  p{:.0} threshold {:.1}% ({} samples)",
        report.baseline.mean_overlap,
        report.baseline.median_overlap,
        report.baseline.percentile,
        report.baseline.threshold,
        report.baseline.sample_size()
    );

    let strong = report.count(Classification::Strong);
    let possible = report.count(Classification::Possible);
    println!(
        "   Flagged wallets:      {} strong, {} possible",
        strong.to_string().red().bold(),
        possible.to_string().yellow()
    );

    if report.flagged.is_empty() {
        println!("\n   {}", "No coordinated wallets detected".green());
    } else {
        println!("\n{}", "🎯 TOP COORDINATED WALLETS:".bold());
        for (i, f) in report.flagged.iter().take(TOP_WALLETS).enumerate() {
            print_flagged_wallet(i + 1, f);
        }
    }

    if !report.edges.is_empty() {
        println!("\n{}", "🕸️  COORDINATION NETWORK:".bold());
        for edge in &report.edges {
            println!(
                "   {} <-> {}  {} shared tokens, avg {:.1}h apart",
                short(&edge.wallet_a),
                short(&edge.wallet_b),
                edge.shared_tokens,
                edge.avg_time_delta_hours
            );
        }
        for (i, cluster) in report.clusters.iter().enumerate() {
            let members: Vec<String> = cluster.iter().map(|w| short(w)).collect();
            println!("   Cluster {}: {}", i + 1, members.join(", "));
        }
    }

    if !report.timing_anomalies.is_empty() {
        println!("\n{}", "⏱️  TIMING ANOMALIES:".bold());
        for a in &report.timing_anomalies {
            println!(
                "   {}  {} bought <6h before, {} <24h before, {} after (score {})",
                token_label(&a.token_mint),
                a.buys_6h_before,
                a.buys_24h_before,
                a.buys_after,
                a.anomaly_score
            );
        }
    }

    if !report.volume_profiles.is_empty() {
        let consistent = report.volume_profiles.iter().filter(|v| v.consistent_sizing).count();
        println!(
            "\n   Volume: {} of {} flagged wallets size their buys consistently",
            consistent,
            report.volume_profiles.len()
        );
    }

    if !report.second_degree.is_empty() {
        println!("\n{}", "🔗 SECOND-DEGREE COORDINATION:".bold());
        for w in report.second_degree.iter().take(TOP_WALLETS) {
            let primaries: Vec<String> = w.primary_wallets().into_iter().map(short).collect();
            println!("   {}  {} matches with {}", short(&w.wallet), w.match_count(), primaries.join(", "));
        }
    }

    if !report.shared_funders.is_empty() {
        println!("\n{}", "💰 SHARED FUNDING SOURCES:".bold());
        for (funder, wallets) in &report.shared_funders {
            println!("   {} funded {} flagged wallets", short(funder), wallets.len());
        }
    }

    if !report.failures.is_empty() {
        println!(
            "\n   {} {} wallets or tokens could not be fetched (see error log)",
            "⚠️".yellow(),
            report.failures.len()
        );
    }
    println!("{}", "=".repeat(70));
}

fn print_flagged_wallet(rank: usize, f: &FlaggedWallet) {
    let s = &f.score;
    let label = match f.classification {
        Classification::Strong => f.classification.label().red().bold(),
        Classification::Possible => f.classification.label().yellow(),
    };
    println!(
        "   {:>2}. {} [{}] score {:.1}  ({} tokens, avg lead {:.1}h, sd {:.1}h{})",
        rank,
        s.wallet,
        label,
        s.final_score,
        s.shared_token_count(),
        s.avg_lead_time_hours,
        s.lead_time_std_dev,
        if s.exceeds_baseline { ", above baseline" } else { "" }
    );
}

pub fn print_written_files(files: &[PathBuf]) {
    println!("\n{}", "📁 REPORTS:".bold());
    for path in files {
        println!("   {}", path.display());
    }
}

fn short(wallet: &str) -> String {
    if wallet.len() <= 12 {
        return wallet.to_string();
    }
    format!("{}...{}", &wallet[..6], &wallet[wallet.len() - 4..])
}
