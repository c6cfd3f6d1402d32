use clap::Parser;

#[derive(Parser)]
#[command(name = "dep-freshness-lsp")]
#[command(
    version,
    about = "Language Server reporting outdated, uninstalled and vulnerable npm dependencies"
)]
struct Cli {}

fn main() -> anyhow::Result<()> {
    Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(dep_freshness_lsp::lsp::server::run_server())
}
