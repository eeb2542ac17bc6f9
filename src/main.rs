fn main() {
    #[cfg(feature = "cli")]
    classpatch::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("classpatch: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
