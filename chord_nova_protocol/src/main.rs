// Chord Nova CLI entry point.
//
// Runs the engine's three operations from the command line and serves the
// JSON protocol over stdin/stdout.
//
// Usage:
//   chordnova generate --chord 60,64,67 [--config FILE] [--weights FILE]
//     [--root-policy bass] [--parallel] [--timeout-ms N] [--midi FILE] [--json]
//   chordnova analyse --ante C4,E4,G4 --post F4,A4,C5 [--json]
//   chordnova substitute --ante .. --post .. [--config FILE] [--timeout-ms N] [--json]
//   chordnova serve
//
// Chords are comma-separated MIDI numbers or note names (C4, Eb3, F#5).
// Set RUST_LOG=debug for per-round rejection tallies.

use std::io::{BufRead, Write};
use std::path::Path;

use chord_nova_core::midi::{MidiOptions, write_midi};
use chord_nova_core::pitch::parse_note_name;
use chord_nova_core::scoring::{RootPolicy, ScoringWeights};
use chord_nova_core::{Chord, ProgressionConfig, SubstitutionConfig};
use chord_nova_protocol::{
    AnalyseRequest, GenerateRequest, Response, ScoringDoc, SubstituteRequest, generation_response, handle_line,
    to_json,
};

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("generate") => cmd_generate(&args),
        Some("analyse") | Some("analyze") => cmd_analyse(&args),
        Some("substitute") => cmd_substitute(&args),
        Some("serve") => cmd_serve(),
        Some("--help") | Some("-h") => print_usage(),
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_usage();
            std::process::exit(1);
        }
        None => {
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Usage: chordnova <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  generate --chord <CHORD>          Generate consequent chords");
    println!("  analyse --ante <CHORD> --post <CHORD>");
    println!("  substitute --ante <CHORD> --post <CHORD>");
    println!("  serve                             One JSON request per stdin line");
    println!();
    println!("Options:");
    println!("  --config <FILE>        ProgressionConfig / SubstitutionConfig JSON");
    println!("  --weights <FILE>       ScoringWeights JSON");
    println!("  --root-policy <NAME>   consonance (default) or bass");
    println!("  --parallel             Scan cardinalities on all cores");
    println!("  --timeout-ms <N>       Stop searching after N milliseconds");
    println!("  --midi <FILE>          Write the progression as a MIDI file");
    println!("  --json                 Print the JSON response document");
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{msg}");
    std::process::exit(1);
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Parse "60,64,67" or "C4 E4 G4" into MIDI numbers.
fn parse_chord(text: &str) -> Result<Vec<i64>, String> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<i64>()
                .ok()
                .or_else(|| parse_note_name(t).map(i64::from))
                .ok_or_else(|| format!("not a pitch: {t:?}"))
        })
        .collect()
}

fn chord_flag(args: &[String], flag: &str) -> Vec<i64> {
    let text: String = parse_flag(args, flag).unwrap_or_else(|| fail(format!("{flag} requires a chord")));
    parse_chord(&text).unwrap_or_else(|e| fail(format!("{flag}: {e}")))
}

fn read_file(path: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| fail(format!("cannot read {path}: {e}")))
}

fn scoring_doc(args: &[String]) -> ScoringDoc {
    let weights = match parse_flag::<String>(args, "--weights") {
        Some(path) => ScoringWeights::from_json(&read_file(&path)).unwrap_or_else(|e| fail(format!("{path}: {e}"))),
        None => ScoringWeights::default(),
    };
    let root_policy = match parse_flag::<String>(args, "--root-policy").as_deref() {
        None | Some("consonance") => RootPolicy::Consonance,
        Some("bass") => RootPolicy::Bass,
        Some(other) => fail(format!("unknown root policy {other:?}")),
    };
    ScoringDoc { root_policy, weights }
}

fn print_json(response: &Response) {
    println!("{}", to_json(response));
}

fn cmd_generate(args: &[String]) {
    let config = match parse_flag::<String>(args, "--config") {
        Some(path) => ProgressionConfig::from_json(&read_file(&path)).unwrap_or_else(|e| fail(format!("{path}: {e}"))),
        None => ProgressionConfig::default(),
    };
    let request = GenerateRequest {
        chord: chord_flag(args, "--chord"),
        config,
        scoring: scoring_doc(args),
        parallel: has_flag(args, "--parallel"),
        timeout_ms: parse_flag(args, "--timeout-ms"),
    };
    let generation = match request.run() {
        Ok(g) => g,
        Err(e) => fail(format!("error ({}): {e}", e.category())),
    };

    if has_flag(args, "--json") {
        print_json(&Response::Generate(generation_response(&generation)));
    } else if request.config.output_mode.wants_text() {
        println!(
            "{:<4} {:<20} {:<8} {:>7} {:>7} {:>3} {:>3} {:>4} {:>8} {:<16}",
            "#", "notes", "name", "tension", "chroma", "c", "sv", "x", "q", "root movement"
        );
        for (i, c) in generation.candidates.iter().enumerate() {
            let b = &c.bigram;
            println!(
                "{:<4} {:<20} {:<8} {:>7.2} {:>7.2} {:>3} {:>3} {:>4} {:>8.2} {:<16}",
                i + 1,
                b.name_with_octave,
                b.name.as_deref().unwrap_or("-"),
                b.tension,
                b.chroma,
                b.common_note,
                b.sv,
                b.similarity,
                b.q_indicator,
                b.root_movement.map_or("-", |rm| rm.as_str()),
            );
        }
        println!();
        println!(
            "{} candidates, {} evaluated{}",
            generation.candidates.len(),
            generation.total_evaluated,
            if generation.interrupted { " (interrupted)" } else { "" }
        );
    }

    if let Some(path) = parse_flag::<String>(args, "--midi") {
        if !request.config.output_mode.wants_midi() {
            fail("--midi given but output_mode excludes MIDI");
        }
        let Ok(seed) = Chord::parse_midi(&request.chord) else {
            fail("invalid seed chord");
        };
        // Continual runs export the whole chain; otherwise seed and best.
        let generated = generation.candidates.iter().map(|c| c.chord());
        let mut progression = vec![seed];
        if request.config.continual {
            progression.extend(generated);
        } else {
            progression.extend(generated.take(1));
        }
        if let Err(e) = write_midi(&progression, &MidiOptions::default(), Path::new(&path)) {
            fail(format!("cannot write {path}: {e}"));
        }
    }
}

fn cmd_analyse(args: &[String]) {
    let request = AnalyseRequest {
        ante: chord_flag(args, "--ante"),
        post: chord_flag(args, "--post"),
        scoring: scoring_doc(args),
    };
    let analysis = match request.execute() {
        Ok(a) => a,
        Err(e) => fail(format!("error ({}): {e}", e.category())),
    };
    if has_flag(args, "--json") {
        print_json(&Response::Analyse(Box::new(analysis)));
        return;
    }
    let b = &analysis.bigram_stats;
    println!("{} -> {}", chord_nova_core::pitch::names_with_octave(&analysis.ante_stats.notes), b.name_with_octave);
    println!("name:          {}", b.name.as_deref().unwrap_or("-"));
    println!("root:          {}", b.root_name.as_deref().unwrap_or("-"));
    println!("voice leading: {:?} (sv {})", analysis.vl_result.vec.as_slice(), analysis.vl_result.sv);
    println!("tension:       {:.2} ({:+.2})", b.tension, b.tension_delta);
    println!("chroma:        {:.2} (old {:.2})", b.chroma, b.chroma_old);
    println!("common notes:  {}", b.common_note);
    println!("similarity:    {}", b.similarity);
    println!("q indicator:   {:.2}", b.q_indicator);
    println!("span / sspan:  {} / {}", b.span, b.sspan);
    println!("root movement: {}", b.root_movement.map_or("-", |rm| rm.as_str()));
}

fn cmd_substitute(args: &[String]) {
    let config = match parse_flag::<String>(args, "--config") {
        Some(path) => SubstitutionConfig::from_json(&read_file(&path)).unwrap_or_else(|e| fail(format!("{path}: {e}"))),
        None => SubstitutionConfig::default(),
    };
    let request = SubstituteRequest {
        ante: chord_flag(args, "--ante"),
        post: chord_flag(args, "--post"),
        config,
        scoring: scoring_doc(args),
        timeout_ms: parse_flag(args, "--timeout-ms"),
    };
    let response = match request.execute() {
        Ok(r) => r,
        Err(e) => fail(format!("error ({}): {e}", e.category())),
    };
    if has_flag(args, "--json") {
        print_json(&Response::Substitute(response));
        return;
    }
    for e in &response.entries {
        println!(
            "{:<10} {:<20} {:<8} sim_orig {:>3}  tension {:>6.2}  q {:>7.2}",
            format!("{:?}", e.side),
            e.stats.name_with_octave,
            e.stats.name.as_deref().unwrap_or("-"),
            e.sim_orig,
            e.stats.tension,
            e.stats.q_indicator,
        );
    }
    for p in &response.pairs {
        println!(
            "pair       {:<20} -> {:<20} q {:>7.2}",
            p.ante.stats.name_with_octave, p.post.stats.name_with_octave, p.bigram.q_indicator
        );
    }
    println!();
    println!(
        "{} entries, {} pairs, {} evaluated{}",
        response.entries.len(),
        response.pairs.len(),
        response.total_evaluated,
        if response.interrupted { " (interrupted)" } else { "" }
    );
}

fn cmd_serve() {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => fail(format!("stdin: {e}")),
        };
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_line(&line);
        if writeln!(stdout, "{reply}").and_then(|()| stdout.flush()).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chord_accepts_numbers_and_names() {
        assert_eq!(parse_chord("60,64,67").unwrap(), vec![60, 64, 67]);
        assert_eq!(parse_chord("C4 E4 G4").unwrap(), vec![60, 64, 67]);
        assert_eq!(parse_chord("Eb3,Bb3").unwrap(), vec![51, 58]);
        assert!(parse_chord("60,H4").is_err());
    }

    #[test]
    fn parse_flag_reads_following_value() {
        let args: Vec<String> = ["chordnova", "generate", "--timeout-ms", "250"].iter().map(|s| s.to_string()).collect();
        assert_eq!(parse_flag::<u64>(&args, "--timeout-ms"), Some(250));
        assert_eq!(parse_flag::<u64>(&args, "--midi"), None);
        assert!(!has_flag(&args, "--parallel"));
    }
}
