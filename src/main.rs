use std::collections::BTreeMap;
use std::io::Write;

use json_extract::PathTree;

fn main() {
    loop {
        print!("json: ");
        std::io::stdout().flush().unwrap();
        let mut json = String::new();
        if std::io::stdin().read_line(&mut json).unwrap() == 0 {
            return;
        }

        print!("queries: ");
        std::io::stdout().flush().unwrap();
        let mut queries = String::new();
        std::io::stdin().read_line(&mut queries).unwrap();

        // e.g. {"name": "user.name", "tags": "user.tags[*]"}
        let queries: BTreeMap<String, String> = match serde_json::from_str(&queries) {
            Ok(queries) => queries,
            Err(err) => {
                println!("{}", err);
                continue;
            }
        };
        let tree = PathTree::compile(&queries);
        match json_extract::extract(&json, &tree) {
            Ok(results) => {
                let results: BTreeMap<_, _> = results.into_map().into_iter().collect();
                println!("{}", serde_json::to_string(&results).unwrap());
            }
            Err(err) => {
                println!("{}", err);
            }
        }
    }
}
