fn main() {
    if let Err(err) = rowscope::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
