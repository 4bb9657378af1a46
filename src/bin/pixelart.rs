use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use pixelart::{
    AnimationKind, COST_PER_CALL_USD, ClientConfig, FixedDelay, Orchestrator, PipelineConfig,
    PixelLabClient,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pixelart",
    version,
    about = "Batch pixel art animation generator using the PixelLab API"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate animations from a config file.
    Generate(GenerateArgs),
    /// Assemble existing frames into GIFs and static fallbacks.
    Assemble(ConfigArgs),
    /// Check PixelLab API credit balance.
    Balance,
    /// Estimate cost without generating anything.
    Cost(ConfigArgs),
    /// Create a starter project.
    Init(InitArgs),
}

#[derive(Parser, Debug)]
struct ConfigArgs {
    /// Path to config.yaml.
    #[arg(long, short = 'c', default_value = "config.yaml")]
    config: PathBuf,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Path to config.yaml.
    #[arg(long, short = 'c', default_value = "config.yaml")]
    config: PathBuf,

    /// Animation type to generate.
    #[arg(long = "type", short = 't', value_enum, default_value_t = KindChoice::All)]
    kind: KindChoice,

    /// Specific animation names to generate (singles, emotes and journeys only).
    #[arg(long, short = 'n', num_args = 0..)]
    target: Vec<String>,
}

#[derive(Parser, Debug)]
struct InitArgs {
    /// Project name.
    #[arg(long, short = 'n', default_value = "my-project")]
    name: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindChoice {
    Singles,
    Emotes,
    Chains,
    Journeys,
    Cycles,
    All,
}

impl KindChoice {
    fn kinds(self) -> Vec<AnimationKind> {
        match self {
            KindChoice::Singles => vec![AnimationKind::Singles],
            KindChoice::Emotes => vec![AnimationKind::Emotes],
            KindChoice::Chains => vec![AnimationKind::Chains],
            KindChoice::Journeys => vec![AnimationKind::Journeys],
            KindChoice::Cycles => vec![AnimationKind::Cycles],
            KindChoice::All => AnimationKind::ALL.to_vec(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Generate(args) => cmd_generate(args),
        Command::Assemble(args) => cmd_assemble(args),
        Command::Balance => cmd_balance(),
        Command::Cost(args) => cmd_cost(args),
        Command::Init(args) => cmd_init(args),
    }
}

fn read_config(path: &std::path::Path) -> anyhow::Result<PipelineConfig> {
    pixelart::load_config(path).with_context(|| format!("load config '{}'", path.display()))
}

fn print_validation_errors(errors: &[String]) {
    eprintln!("Config validation errors:");
    for e in errors {
        eprintln!("  - {e}");
    }
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let config = read_config(&args.config)?;
    let errors = config.validate();
    if !errors.is_empty() {
        print_validation_errors(&errors);
        std::process::exit(1);
    }

    println!("Project: {}", config.name);
    println!("Output: {}", config.output_dir.display());

    let mut client = PixelLabClient::new(ClientConfig::from_env()?)?;
    match client.balance() {
        Ok(bal) => println!("Balance: ${:.2}", bal.credits_usd),
        Err(e) => eprintln!("Balance check failed: {e}"),
    }

    let mut pacer = FixedDelay::default();
    let mut orchestrator = Orchestrator::new(&config, &mut client, &mut pacer)?;
    let total = orchestrator.run(&args.kind.kinds(), &args.target);
    let report = orchestrator.into_report();

    println!(
        "\nTotal cost: ${total:.2} ({} calls, {} failed)",
        report.total_calls(),
        report.calls_failed
    );

    if let Ok(bal) = client.balance() {
        println!("Remaining balance: ${:.2}", bal.credits_usd);
    }
    Ok(())
}

fn cmd_assemble(args: ConfigArgs) -> anyhow::Result<()> {
    let config = read_config(&args.config)?;
    let count = pixelart::reassemble_existing(&config)?;
    println!("Assembled {count} animations.");
    Ok(())
}

fn cmd_balance() -> anyhow::Result<()> {
    let client = PixelLabClient::new(ClientConfig::from_env()?)?;
    let bal = client.balance().context("check balance")?;
    println!("Credits: ${:.2} USD", bal.credits_usd);
    println!(
        "Generations: {}/{}",
        bal.generations_used, bal.generations_total
    );
    Ok(())
}

fn cmd_cost(args: ConfigArgs) -> anyhow::Result<()> {
    let config = read_config(&args.config)?;
    let errors = config.validate();
    if !errors.is_empty() {
        // The estimate does not need a valid reference image.
        print_validation_errors(&errors);
    }

    let counts = config.count_animations();
    let usd = |n: usize| n as f64 * COST_PER_CALL_USD;

    println!("Project: {}", config.name);
    println!("\nAnimation counts:");
    println!(
        "  Singles:  {:>4} animations  (~${:.2})",
        counts.singles,
        usd(counts.singles)
    );
    println!(
        "  Emotes:   {:>4} animations  (~${:.2})",
        counts.emotes,
        usd(counts.emotes)
    );
    println!(
        "  Chains:   {:>4} API calls    (~${:.2})",
        counts.chains,
        usd(counts.chains)
    );
    println!(
        "  Journeys: {:>4} API calls    (~${:.2})",
        counts.journeys,
        usd(counts.journeys)
    );
    println!(
        "  Cycles:   {:>4} API calls    (~${:.2})",
        counts.cycles,
        usd(counts.cycles)
    );
    println!("  {}", "-".repeat(40));
    println!("  Total:    {:>4} API calls", counts.total_api_calls());
    println!("\nEstimated cost: ~${:.2}", config.estimate_cost());
    Ok(())
}

fn cmd_init(args: InitArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("resolve current directory")?;
    let project = pixelart::scaffold::init_project(&cwd, &args.name)?;

    if project.created_reference {
        println!("Created reference image: {}", project.reference.display());
    }
    if project.created_config {
        println!("Created config: {}", project.config.display());
    }

    println!("\nProject initialized at: {}/", project.dir.display());
    println!("\nNext steps:");
    println!(
        "  1. Edit {} to customize your animations",
        project.config.display()
    );
    println!(
        "  2. Replace {} with your own 64x64 starting image",
        project.reference.display()
    );
    println!("  3. export {}=your-key-here", pixelart::client::API_KEY_ENV);
    println!("  4. pixelart cost --config {}", project.config.display());
    println!("  5. pixelart generate --config {}", project.config.display());
    Ok(())
}
