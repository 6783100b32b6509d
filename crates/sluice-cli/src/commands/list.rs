//! `sluice list`: show available node and stage types.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use clap::Args;
use sluice_registry::{Category, Descriptor, FUSE, Kind, Registry};
use sluice_remote::RemoteSession;

#[derive(Args)]
pub struct ListArgs {
    /// Only show one category (source, framing, spectral, utility, sink)
    #[arg(short, long)]
    category: Option<String>,

    /// Ask a running server at HOST:PORT instead
    #[arg(long, value_name = "HOST:PORT")]
    remote: Option<String>,
}

fn parse_category(name: &str) -> Option<Category> {
    Category::ALL
        .into_iter()
        .find(|c| c.name().eq_ignore_ascii_case(name))
}

fn kind_label(kind: Kind) -> &'static str {
    match kind {
        Kind::Node => "node",
        Kind::Stage => "stage",
    }
}

fn print_table(descriptors: &[&Descriptor]) {
    println!("  {:12}  {:12}  {:6}  {}", "ID", "Name", "Kind", "Description");
    println!("  {:12}  {:12}  {:6}  {}", "--", "----", "----", "-----------");
    for d in descriptors {
        println!("  {:12}  {:12}  {:6}  {}", d.id, d.name, kind_label(d.kind), d.description);
    }
}

pub fn run(args: ListArgs) -> anyhow::Result<()> {
    if let Some(addr) = &args.remote {
        let types = RemoteSession::types_at(addr.as_str())?;
        println!("{addr} offers {} types:", types.len());
        for id in types {
            println!("  {id}");
        }
        return Ok(());
    }

    let registry = Registry::new();
    let categories = match &args.category {
        Some(name) => vec![parse_category(name).ok_or_else(|| anyhow::anyhow!("Unknown category: {}", name))?],
        None => Category::ALL.to_vec(),
    };

    for category in categories {
        let descriptors = registry.in_category(category);
        if descriptors.is_empty() {
            continue;
        }
        println!("{}", category.name());
        println!("{}", "=".repeat(category.name().len()));
        print_table(&descriptors);
        println!();
    }
    println!("Stages can be fused with '{FUSE}', for example: window{FUSE}sum");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_parse_case_insensitively() {
        assert_eq!(parse_category("spectral"), Some(Category::Spectral));
        assert_eq!(parse_category("SINK"), Some(Category::Sink));
        assert_eq!(parse_category("effects"), None);
    }
}
