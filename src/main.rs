use std::process::exit;

fn main() {
    if let Err(e) = idle_assets::app::run_cli() {
        eprintln!("{e}");
        exit(1);
    }
}
