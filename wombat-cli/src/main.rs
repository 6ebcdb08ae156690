//! Wombat CLI
//!
//! A headless harness for the HTML parser: parse a file or a literal
//! string, dump the node tree and every recovered parse error.

use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;
use std::fs;

use wombat_html::{SaxParser, print_tree};

#[derive(Parser)]
#[command(name = "wombat", about = "Parse HTML and dump the node tree")]
struct Args {
    /// Path to an HTML file (ignored when --html is given).
    file: Option<String>,

    /// Parse this HTML string instead of a file.
    #[arg(long)]
    html: Option<String>,

    /// Parse as a fragment with this context element name (e.g. "td").
    #[arg(long)]
    fragment: Option<String>,

    /// Treat noscript/script content as if scripting were enabled.
    #[arg(long)]
    scripting: bool,

    /// Only print the parse errors, not the tree.
    #[arg(long)]
    errors_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let source = match (&args.html, &args.file) {
        (Some(html), _) => html.clone(),
        (None, Some(path)) => fs::read_to_string(path)?,
        (None, None) => anyhow::bail!("provide a file path or --html '<html>...</html>'"),
    };

    let mut parser = SaxParser::new();
    parser.set_scripting_enabled(args.scripting);

    let (tree, root, errors) = match &args.fragment {
        Some(context) => parser.parse_fragment_to_tree(&source, context),
        None => {
            let (tree, errors) = parser.parse_to_tree(&source);
            let root = tree.root();
            (tree, root, errors)
        }
    };

    if !args.errors_only {
        println!("=== Node Tree ===");
        print_tree(&tree, root, 0);
        println!();
    }

    println!("=== Parse Errors ({}) ===", errors.len());
    for error in &errors {
        let position = format!(
            "{}:{}",
            error.location.line + 1,
            error.location.column + 1
        );
        println!(
            "{} {} {}",
            position.dimmed(),
            error.code.yellow(),
            error.message
        );
    }

    Ok(())
}
