use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = iq_api::Args::parse();

	iq_api::run(args).await
}
