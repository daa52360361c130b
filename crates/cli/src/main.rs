fn main() {
    if let Err(error) = pagepoint_cli::run(std::env::args_os()) {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}
