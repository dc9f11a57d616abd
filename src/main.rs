fn main() {
    if let Err(err) = quad_batch::run() {
        eprintln!("Application error: {err}");
    }
}
