use std::io::{self, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use microgit::{clone, error::{Error, Result}, hash::Hash, repository::Repository, store::ObjectType};

#[derive(Parser)]
#[command(name = "microgit", version, about = "A minimal content-addressed object store and fetch client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty repository in the current directory
    Init,

    /// Print the contents of an object
    CatFile {
        /// Pretty-print the object's body (currently the only supported mode)
        #[arg(short = 'p')]
        print: bool,
        /// Object digest, as 40 hex characters
        hash: String,
    },

    /// Create a blob object from a file and store it
    HashObject {
        /// Write the object to the store (currently the only supported mode)
        #[arg(short = 'w')]
        write: bool,
        /// Path of the file to hash
        path: PathBuf,
    },

    /// List the names of a tree's entries
    LsTree {
        /// Print only entry names (currently the only supported mode)
        #[arg(long)]
        name_only: bool,
        /// Tree digest, as 40 hex characters
        hash: String,
    },

    /// Build a tree object from the current directory and print its digest
    WriteTree,

    /// Create a commit object
    CommitTree {
        /// Tree digest, as 40 hex characters
        tree: String,
        /// Parent commit digest, as 40 hex characters
        #[arg(short = 'p')]
        parent: Option<String>,
        /// Commit message
        #[arg(short = 'm')]
        message: String,
    },

    /// Clone a remote repository over the smart-HTTP protocol
    Clone {
        /// Base URL of the remote repository
        url: String,
        /// Destination directory, created if missing
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();

    if let Err(err) = run(Cli::parse().command) {
        eprintln!("microgit: {}", err);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Init => cmd_init(),
        Command::CatFile { hash, .. } => cmd_cat_file(&hash),
        Command::HashObject { path, .. } => cmd_hash_object(&path),
        Command::LsTree { hash, .. } => cmd_ls_tree(&hash),
        Command::WriteTree => cmd_write_tree(),
        Command::CommitTree { tree, parent, message } => cmd_commit_tree(&tree, parent.as_deref(), &message),
        Command::Clone { url, dir } => cmd_clone(&url, &dir),
    }
}

fn parse_hash(hex: &str) -> Result<Hash> {
    Hash::from_hex(hex).ok_or_else(|| Error::Format(format!("not a valid 40-character hex digest: {}", hex)))
}

fn cmd_init() -> Result<()> {
    Repository::init(".")?;
    Ok(())
}

fn cmd_cat_file(hex: &str) -> Result<()> {
    let hash = parse_hash(hex)?;
    let repo = Repository::at(".");
    let object = repo.objects().read(&hash)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(object.body()).map_err(|e| Error::Io { path: ".".into(), source: e })
}

fn cmd_hash_object(path: &std::path::Path) -> Result<()> {
    let repo = Repository::at(".");
    let hash = repo.objects().write_blob_from_file(path)?;
    println!("{}", hash);
    Ok(())
}

fn cmd_ls_tree(hex: &str) -> Result<()> {
    let hash = parse_hash(hex)?;
    let repo = Repository::at(".");
    let object = repo.objects().read_as(&hash, ObjectType::Tree)?;

    let mut iter = microgit::store::TreeIter::new(object.body());
    while let Some(entry) = iter.next()? {
        println!("{}", entry.name);
    }
    Ok(())
}

fn cmd_write_tree() -> Result<()> {
    let repo = Repository::at(".");
    let hash = repo.objects().write_tree_from_dir(std::path::Path::new("."))?;
    println!("{}", hash);
    Ok(())
}

fn cmd_commit_tree(tree_hex: &str, parent_hex: Option<&str>, message: &str) -> Result<()> {
    let tree = parse_hash(tree_hex)?;
    let parent = parent_hex.map(parse_hash).transpose()?;

    let repo = Repository::at(".");
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let identity = ("Dev", "dev@example.com");
    let hash = repo.objects().write_commit(
        &tree,
        parent.as_ref(),
        identity,
        identity,
        timestamp,
        "+0000",
        message,
    )?;

    println!("{}", hash);
    Ok(())
}

fn cmd_clone(url: &str, dir: &std::path::Path) -> Result<()> {
    clone::clone(url, dir)?;
    Ok(())
}
