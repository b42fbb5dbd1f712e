use clap::Parser;
use ordkv::{LevelDB, Options, PosixEnv};

#[derive(Parser)]
struct Args {
    #[arg(long, default_value = "demo")]
    db: String,
}

fn main() {
    let args = Args::parse();

    let mut options = Options::default();
    options.create_if_missing = true;
    let env = PosixEnv {};
    let db = LevelDB::open(options, &args.db, env).unwrap();
    println!("sequence: {}", db.get_property("leveldb.sequence").unwrap());
    for level in 0..7 {
        println!("level {}: {} files", level, db.num_files_at_level(level));
    }
}
