pub mod progress;

pub fn print_banner() {
    println!("soundwave-rs");
}
