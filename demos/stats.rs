use std::collections::HashSet;
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<_> = env::args().collect();

    if args.len() != 2 {
        println!("Usage:\n\tcargo run --example stats -- input.xml");
        process::exit(1);
    }

    let data = match fs::read(&args[1]) {
        Ok(v) => v,
        Err(e) => {
            println!("Error: {}.", e);
            process::exit(1);
        }
    };

    let doc = match xmlpick::Document::from_bytes(&data) {
        Ok(v) => v,
        Err(e) => {
            println!("Error: {}.", e);
            process::exit(1);
        }
    };

    println!("Root element: {}", doc.root_element().name());

    println!("Elements count: {}", doc.descendants().count());

    println!("Leaf elements count: {}",
             doc.descendants().filter(|n| n.is_leaf()).count());

    let attrs_count: usize = doc.descendants().map(|n| n.attributes().len()).sum();
    println!("Attributes count: {}", attrs_count);

    let mut names = HashSet::new();
    for node in doc.descendants() {
        names.insert(node.name());
    }
    println!("Unique element names count: {}", names.len());

    let last_leaf = doc.descendants()
        .filter(|n| n.is_leaf())
        .max_by_key(|n| n.pos());
    if let Some(node) = last_leaf {
        println!("Last leaf: <{}> at {}", node.name(), doc.text_pos_at(node.pos()));
    }
}
