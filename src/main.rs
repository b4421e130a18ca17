fn main() {
    if let Err(err) = shipment_report::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
