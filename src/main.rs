fn main() -> anyhow::Result<()> {
    estate_desk::cli::run()
}
