fn main() {
    if let Err(err) = deal_lens::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
