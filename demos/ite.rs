use clap::Parser;

use symbv_rs::{bvs, bvv, ite_dict, reverse_ite_cases, Config, Solver, Strategy};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of cases in the lookup table.
    #[arg(value_name = "INT", default_value = "9")]
    cases: u64,

    /// Solving strategy: direct, hybrid or composite.
    #[clap(long, value_name = "STRATEGY", default_value = "hybrid")]
    strategy: Strategy,

    /// Maximum number of values to enumerate.
    #[clap(short, value_name = "INT", default_value = "100")]
    n: usize,

    /// Query timeout in milliseconds.
    #[clap(long, value_name = "MS", default_value = "30000")]
    timeout: u64,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let config = Config::default().with_timeout_ms(args.timeout);
    let s = Solver::with_config(args.strategy, config);

    // Lookup table: x -> 11 * x, everything else -> 0
    let x = bvs("x", 32)?;
    let table = ite_dict(&x, (1..=args.cases).map(|i| (i, 11 * i)), bvv(0, 32)?)?;
    println!("table = {}", table.shallow_repr(3));
    println!("table depth = {}", table.depth());

    for case in reverse_ite_cases(&table).take(3) {
        let (cond, value) = case?;
        println!("case {} -> {}", cond.shallow_repr(2), value);
    }

    let values = s.eval(&table, args.n)?;
    println!("table takes {} values: {:?}", values.len(), values);

    // Pin the output and recover the input
    if let Some(&last) = values.last() {
        let mut ss = s.branch();
        ss.add(table.eq_(last)?)?;
        println!("table == {} when x in {:?}", last, ss.eval(&x, args.n)?);
    }

    // Hoisting the table out of arithmetic
    let shifted = table.add(1)?.mul(2)?;
    println!("shifted = {}", shifted.shallow_repr(3));
    println!("excavated = {}", shifted.ite_excavated().shallow_repr(3));
    println!("shifted takes {:?}", s.eval(&shifted, args.n)?);

    println!("\nAll done in {:.3} s", time_total.elapsed().as_secs_f64());

    Ok(())
}
