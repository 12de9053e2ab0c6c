use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    chatbridge::cli::main()
}
