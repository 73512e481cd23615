use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail, Context};
use clap::Parser as ClapParser;
use multisite::access_control::Databases;
use multisite::easy_fs::read_to_string;
use multisite::hash_util::create_password_hash;
use multisite::template::Engine;
use multisite::template::value::context_from_value;


fn try_ask_input(ask: &str) -> Result<Option<String>> {
    let mut outp = std::io::stdout().lock();
    write!(&mut outp, "{ask}: ")?;
    outp.flush()?;
    let inp = std::io::stdin();
    let mut line = String::new();
    if inp.read_line(&mut line)? == 0 {
        Ok(None)
    } else {
        Ok(Some(line.trim_end().into()))
    }
}

fn ask_input(ask: &str) -> Result<String> {
    try_ask_input(ask)?.ok_or_else(|| anyhow!("cancelled by user"))
}

fn site_databases(sitedir: &Path) -> Result<Databases> {
    if ! sitedir.join("site.json").is_file() {
        bail!("{sitedir:?} is not a site directory (missing site.json)")
    }
    Databases::open(&sitedir.join("data"))
}

#[derive(clap::Parser, Debug)]
/// Administer the sites served by multisite.
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Create a user who can log into the site. Asks for the password
    /// if not given.
    Adduser {
        sitedir: PathBuf,
        username: String,
        name: String,
        password: Option<String>,
    },
    /// Change the password of a user of the site.
    Passwd {
        sitedir: PathBuf,
        username: String,
    },
    /// Render a template file to stdout; errors go to stderr.
    Render {
        file: PathBuf,
        /// JSON file with the data to render with
        #[clap(long)]
        data: Option<PathBuf>,
    },
    /// Print the password hash for the given password.
    Hash {
        password: String,
    },
    /// List the stored submissions of a form, newest first.
    Forms {
        sitedir: PathBuf,
        form: String,
    },
    /// Print the number of recorded views of a path.
    Views {
        sitedir: PathBuf,
        path: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Adduser { sitedir, username, name, password } => {
            let dbs = site_databases(&sitedir)?;
            let password = match password {
                Some(p) => p,
                None => ask_input("new password")?,
            };
            let user = dbs.add_user(&username, &name, &password)?;
            println!("added user {:?} with id {}", user.username,
                     user.id.ok_or_else(|| anyhow!("user without id"))?);
        }
        Command::Passwd { sitedir, username } => {
            let dbs = site_databases(&sitedir)?;
            let password = ask_input("new password")?;
            if ! dbs.set_password(&username, &password)? {
                bail!("no user {username:?}")
            }
        }
        Command::Render { file, data } => {
            let source = read_to_string(&file)?;
            let local = match data {
                Some(path) => context_from_value(
                    serde_json::from_str(&read_to_string(&path)?).with_context(
                        || anyhow!("parsing JSON file {path:?}"))?),
                None => Default::default(),
            };
            let engine = Engine::builder().build();
            let rendered = engine.render(&source, local);
            print!("{}", rendered.output);
            std::io::stdout().flush()?;
            if ! rendered.is_ok() {
                for e in &rendered.errors {
                    eprintln!("{}: {e}", file.to_string_lossy());
                }
                std::process::exit(1);
            }
        }
        Command::Hash { password } => {
            println!("{}", create_password_hash(&password)?);
        }
        Command::Forms { sitedir, form } => {
            let dbs = site_databases(&sitedir)?;
            for submission in dbs.form_submissions(&form)? {
                println!("{}\t{}", submission.unixtime, submission.fields);
            }
        }
        Command::Views { sitedir, path } => {
            let dbs = site_databases(&sitedir)?;
            println!("{}", dbs.count_page_views(&path)?);
        }
    }
    Ok(())
}
