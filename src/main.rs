use anyhow::Result;

fn main() -> Result<()> {
    fadelog::cli::run()
}
