pub mod cli;
pub mod compile;
pub mod config;
pub mod pattern;
pub mod render;
pub mod ruby;
pub mod trace;
pub mod tree;
pub mod visualize;

use anyhow::{bail, Context, Result};

use cli::Args;
use compile::DebugCompiler;
use pattern::parse_pattern;
use trace::Trace;
use visualize::visualize;

/// Run the debugger. Returns the exit code: 0 = matched, 1 = no match;
/// fatal errors (bad pattern, unreadable input, invalid config) propagate.
pub fn run(args: Args) -> Result<i32> {
    if args.tokenize {
        for spanned in pattern::Lexer::new(&args.pattern).tokenize() {
            println!(
                "{:>4}..{:<4} {:?}",
                spanned.span.start, spanned.span.end, spanned.token
            );
        }
        return Ok(0);
    }

    let ast = parse_pattern(&args.pattern)?;

    if args.parse {
        println!("{}", ast.summary());
        println!("{ast:#?}");
        return Ok(0);
    }

    let compiler = DebugCompiler::new();
    let compiled = compiler.compile(&ast)?;

    if args.compile {
        let params: Vec<String> = compiled.params().iter().map(|p| p.to_string()).collect();
        println!("parameters: {}", params.join(", "));
        println!("positions:");
        for position in compiled.positions() {
            println!(
                "  {:>3}  {:>4}..{:<4} {}",
                position.id.0, position.span.start, position.span.end, position.summary
            );
        }
        return Ok(0);
    }

    let source: Vec<u8> = if let Some(code) = &args.eval {
        code.clone().into_bytes()
    } else if let Some(path) = &args.file {
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?
    } else {
        bail!("no Ruby input: pass --eval CODE or --file FILE");
    };

    let analysis = ruby::analyze(&source)?;
    let mut trace = Trace::new();
    let outcome = compiled.run_traced(&analysis.root, &mut trace)?;
    let viz = visualize(&analysis.root, &trace, analysis.source.len());

    if args.json {
        println!("{}", render::render_json(&outcome, &viz)?);
    } else {
        let scheme = config::load_scheme(args.config.as_deref())?;
        print!(
            "{}",
            render::render_ansi(&analysis.source, &viz, &scheme, !args.no_color)
        );
        if !analysis.source.ends_with(b"\n") {
            println!();
        }
        println!();
        if outcome.matched {
            println!("Pattern matched.");
        } else {
            println!("Pattern did not match.");
        }
        for (i, capture) in outcome.captures.iter().enumerate() {
            match capture {
                compile::Captured::Node { tag, span, .. } => match span {
                    Some(s) => {
                        let text = String::from_utf8_lossy(
                            &analysis.source[s.start.min(analysis.source.len())
                                ..s.end.min(analysis.source.len())],
                        );
                        println!("capture {i}: ({tag}) {text}");
                    }
                    None => println!("capture {i}: ({tag})"),
                },
                compile::Captured::Name(name) => println!("capture {i}: {name}"),
                compile::Captured::Absent => println!("capture {i}: <absent>"),
            }
        }
    }

    Ok(if outcome.matched { 0 } else { 1 })
}
