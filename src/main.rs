// File: main.rs
//
// The purpose of this file is to demonstrate the ring from the command
// line: build one, join some nodes, insert a few keys, and print the
// resulting state before and after a node leaves.

use structopt::StructOpt;
use torc::{Id, Ring};

/// Holds data parsed from the command line to set up the demonstration ring
#[derive(StructOpt, Debug)]
#[structopt(name = "torc")]
pub struct CLI {
  #[structopt(short, long)]
  debug: bool,

  /// Number of bits in the identifier space
  #[structopt(long, default_value = "6")]
  bits: u32,

  /// Identifiers to join, in order
  #[structopt(long)]
  node: Vec<Id>,

  /// Keys to insert; each stores a value derived from the key
  #[structopt(long)]
  key: Vec<String>,
}

/// Main function
fn main() {
  let cli = CLI::from_args();

  let level = if cli.debug {
    log::LevelFilter::Debug
  } else {
    log::LevelFilter::Info
  };
  env_logger::Builder::from_default_env()
    .filter_level(level)
    .init();

  let mut ring: Ring<String> = Ring::new(cli.bits);

  let node_ids = if cli.node.is_empty() {
    vec![1, 8, 14, 21, 32, 38, 42, 48, 51, 56]
  } else {
    cli.node
  };
  for id in node_ids {
    if let Err(err) = ring.join(id) {
      log::warn!("skipping node {}: {}", id, err);
    }
  }

  let keys = if cli.key.is_empty() {
    vec!["alice", "bob", "carol", "dave", "erin", "frank"]
      .into_iter()
      .map(String::from)
      .collect()
  } else {
    cli.key
  };
  for key in &keys {
    if let Err(err) = ring.insert(key, format!("value of {}", key)) {
      log::warn!("skipping key {:?}: {}", key, err);
    }
  }

  println!("ring with {} nodes:", ring.len());
  print_state(&ring);

  for key in &keys {
    match ring.lookup(key) {
      Ok(Some(value)) => println!("lookup {:?} -> {:?}", key, value),
      Ok(None) => println!("lookup {:?} -> absent", key),
      Err(err) => println!("lookup {:?} failed: {}", key, err),
    }
  }

  // drop the entry node so the key migration is visible in the second dump
  if let Some(first) = ring.nodes_in_order().first().map(|node| node.id()) {
    if ring.len() > 1 {
      ring
        .leave(first)
        .expect("the entry node was enumerated a moment ago");
      println!("after node {} left:", first);
      print_state(&ring);
    }
  }
}

/// Prints the per-node state of the ring as pretty JSON
fn print_state(ring: &Ring<String>) {
  let summary = ring.summary();
  let json = serde_json::to_string_pretty(&summary).expect("summary serializes to JSON");
  println!("{}", json);
}
