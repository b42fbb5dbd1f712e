use clap::Parser;
use ordkv::{LevelDB, Options, PosixEnv};

#[derive(Parser)]
struct Args {
    #[arg(long, default_value = "demo")]
    db: String,

    #[arg(long, default_value_t = 20)]
    count: u32,
}

fn main() {
    let args = Args::parse();

    let mut options = Options::default();
    options.create_if_missing = true;
    let env = PosixEnv {};
    let db = LevelDB::open(options, &args.db, env).unwrap();
    for i in 0..args.count {
        db.write(format!("liu{}", i).as_bytes(), "zhong".as_bytes())
            .unwrap();
    }
}
