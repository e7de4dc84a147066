//! Builds a fully cyclic neighbor graph and watches the forest reclaim it.

use anyhow::Result;
use arbor::{Forest, RelationPtr};

struct City {
    name: &'static str,
    roads: Vec<RelationPtr<City>>,
}

fn main() -> Result<()> {
    let forest = Forest::new();
    let pool = forest.pool();

    println!("Cyclic Graph Collection Demo");
    println!("============================");

    let names = ["Aldgate", "Brixton", "Camden", "Dalston"];
    let cities: Vec<_> = names
        .iter()
        .map(|&name| {
            pool.make(City {
                name,
                roads: Vec::new(),
            })
        })
        .collect();

    // Every city owns a road to every other: dense cycles everywhere.
    for (i, from) in cities.iter().enumerate() {
        for (j, to) in cities.iter().enumerate() {
            if i != j {
                let road = to.claim_from(from);
                from.with_mut(|c| c.roads.push(road))?;
            }
        }
    }

    println!("trees: {}, nodes: {}", forest.size(), forest.live_nodes());
    for city in &cities {
        let (name, degree) = city.with(|c| (c.name, c.roads.len()))?;
        println!("  {name}: {degree} outgoing roads");
    }

    // Drop the external handles one by one; claims keep everything alive
    // until the last root goes.
    let mut cities = cities;
    while let Some(city) = cities.pop() {
        drop(city);
        println!(
            "dropped a root -> trees: {}, nodes: {}",
            forest.size(),
            forest.live_nodes()
        );
    }

    forest.collect();
    println!(
        "after collect  -> trees: {}, nodes: {}",
        forest.size(),
        forest.live_nodes()
    );
    Ok(())
}
