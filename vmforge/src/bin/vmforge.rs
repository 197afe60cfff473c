#[tokio::main]
async fn main() {
    let code = vmforge::commands::run(std::env::args_os()).await;
    std::process::exit(code);
}
