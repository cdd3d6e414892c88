fn main() {
    if let Err(e) = box_ledger::run() {
        eprintln!("box-ledger: {}", e);
        std::process::exit(1);
    }
}
