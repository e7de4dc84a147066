//! Walks through reparenting: what happens to a node's tree position as its
//! root handle goes away while claimants survive.

use anyhow::Result;
use arbor::Forest;

fn main() -> Result<()> {
    let forest = Forest::new();
    let pool = forest.pool();

    println!("Ownership Transfer Demo");
    println!("=======================");

    let parent = pool.make(String::from("parent"));
    let child = pool.make(String::from("child"));
    let spare = pool.make(String::from("spare"));

    // Two claimants for the child; the first registered wins the tree edge.
    let claim_by_parent = child.claim_from(&parent);
    let claim_by_spare = child.claim_from(&spare);

    println!("\nbefore root loss ({} trees):", forest.size());
    forest.print();

    let mut child_root = child;
    child_root.reset();

    println!(
        "\nchild root dropped -> reparented under {:?} ({} trees):",
        claim_by_parent.parent_id(),
        forest.size()
    );
    forest.print();

    // Severing the promoted claim hands the child to the next claimant.
    drop(claim_by_parent);
    println!(
        "\nfirst claim released -> reparented under {:?} ({} trees):",
        claim_by_spare.parent_id(),
        forest.size()
    );
    forest.print();

    drop(claim_by_spare);
    drop(parent);
    drop(spare);
    println!(
        "\nall handles gone -> {} nodes remain",
        forest.live_nodes()
    );
    Ok(())
}
