// Prints the Authorization header value for a username/password pair
//
// Usage: encode_credentials <username> <password>

use clap::Parser;

use voice_notes_api::config::Credentials;
use voice_notes_api::handlers::authentication::encode_basic_authorization;

#[derive(Parser, Debug)]
#[command(name = "encode_credentials")]
#[command(about = "Encode API credentials as an HTTP Basic Authorization header")]
struct Args {
    /// API username
    username: String,

    /// API password
    password: String,
}

fn main() {
    let args = Args::parse();
    let header = encode_basic_authorization(&Credentials::new(args.username, args.password));

    println!("Authorization header:");
    println!("{}", header);
    println!();
    println!("Example:");
    println!(
        "curl -H \"Authorization: {}\" http://127.0.0.1:8000/api/v1/paraphrase_logs",
        header
    );
}
