use clap::Parser;
use rand::{SeedableRng, rngs::StdRng};
use vm_sim::{
    Config, Engine, Random, Stats,
    config::{DEFAULT_MAX_ADDRESS_SPACE, DEFAULT_PHYSICAL_PAGE_COUNT, DEFAULT_TLB_CAPACITY},
    workload::Workload,
};

#[derive(Parser)]
#[command(name = "vm-sim")]
#[command(about = "Walk virtual addresses through a TLB, a page table and physical memory")]
#[command(version)]
struct Cli {
    /// Virtual addresses to translate, in order
    #[arg(allow_negative_numbers = true)]
    addresses: Vec<i64>,

    /// Generate this many addresses instead of (or after) the given ones
    #[arg(short, long)]
    random: Option<usize>,

    /// Size of the virtual address space
    #[arg(long, default_value_t = DEFAULT_MAX_ADDRESS_SPACE)]
    max: usize,

    /// Number of TLB entries
    #[arg(long, default_value_t = DEFAULT_TLB_CAPACITY)]
    tlb: usize,

    /// Number of physical pages
    #[arg(long, default_value_t = DEFAULT_PHYSICAL_PAGE_COUNT)]
    frames: usize,

    /// Random seed for eviction and address generation
    #[arg(long)]
    seed: Option<u64>,

    /// Print the tables after every step
    #[arg(short, long)]
    tables: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = Config::new(cli.max, cli.tlb, cli.frames);
    let seed = cli.seed.unwrap_or_else(rand::random);

    let mut engine = match Engine::with_policy(config, Random::seeded(seed)) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(2);
        }
    };

    print_header(&config, seed);

    let mut addresses = cli.addresses.clone();
    if let Some(count) = cli.random {
        let rng = StdRng::seed_from_u64(seed.wrapping_add(1));
        let working_set = config.physical_page_count.min(config.page_table_size());
        addresses.extend(Workload::new(config, rng, working_set, count, 8).map(|a| a as i64));
    }
    if addresses.is_empty() {
        eprintln!("error: no virtual addresses given; pass some or use --random");
        std::process::exit(2);
    }

    for address in addresses {
        let va = match engine.begin_translation(address) {
            Ok(va) => va,
            Err(err) => {
                eprintln!("skipping {}: {}", address, err);
                continue;
            }
        };
        println!("## {}", va);
        loop {
            let step = match engine.step() {
                Ok(step) => step,
                Err(err) => {
                    eprintln!("error: {}", err);
                    std::process::exit(1);
                }
            };
            if !step.message.is_empty() {
                println!("- [{}] {}", step.from, step.message);
            }
            if cli.tables && !step.done {
                println!("\n{}", engine.snapshot());
            }
            if let Some(pa) = step.physical_address {
                println!("- Result: {}\n", pa);
            }
            if step.done {
                break;
            }
        }
    }

    println!("## Final tables\n");
    println!("{}", engine.snapshot());
    print_report(engine.stats());
}

fn print_header(config: &Config, seed: u64) {
    println!("# Address Translation Walkthrough\n");
    print_row_header("## Configuration");
    print_row("Address space", &config.max_address_space);
    print_row("Page size", &config.page_size);
    print_row("Virtual pages", &config.page_table_size());
    print_row("TLB entries", &config.tlb_capacity);
    print_row("Physical pages", &config.physical_page_count);
    print_row("Seed", &seed);
    println!();
}

fn print_report(stats: &Stats) {
    print_row_header("## Stats");
    print_row("Translations", &stats.translations);
    print_row("TLB hits", &stats.tlb_hits);
    print_row("TLB misses", &stats.tlb_misses);
    print_row("Page faults", &stats.page_faults);
    print_row("Page evictions", &stats.frame_evictions);
    print_row("TLB evictions", &stats.tlb_evictions);
    print_row("Hit rate", &format!("{:.2}%", stats.hit_rate()));
    print_row("Miss rate", &format!("{:.2}%", stats.miss_rate()));
    println!();
}

fn print_row_header(title: &str) {
    println!("{}", title);
    println!("| {:<20} | {:<20} |", "Metric", "Value");
    println!("| {:-<20} | {:-<20} |", "-", "-");
}

fn print_row(label: &str, value: &dyn std::fmt::Display) {
    println!("| {:<20} | {:<20} |", label, value);
}
