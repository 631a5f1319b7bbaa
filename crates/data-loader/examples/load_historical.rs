use data_loader::parser;
use std::path::Path;
use std::time::Instant;

fn main() {
    let path = Path::new("data/openingweekend.csv");

    println!("Loading historical opening-weekend table...\n");

    let start = Instant::now();
    let records = parser::parse_historical(path).expect("Failed to load dataset");
    let elapsed = start.elapsed();

    let total_opening: f64 = records.iter().filter_map(|r| r.opening).sum();

    println!("\n=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Rows: {}", records.len());
    println!("Total opening revenue: ${:.0}", total_opening);
    println!("\nPerformance: {:.0} rows/second",
             records.len() as f64 / elapsed.as_secs_f64());
}
