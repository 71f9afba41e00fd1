use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::Path;
use tracing::error;

use artifact_dav::{config::Config, services::webdav::DavTransport, DavResource, Depth, WebDAVWagon};

fn cli() -> Command {
    Command::new("artifact-dav")
        .about("Move artifacts to and from a WebDAV repository")
        .subcommand_required(true)
        .subcommand(
            Command::new("put")
                .about("Upload a file, creating missing collections")
                .arg(Arg::new("file").help("Local file to upload").required(true).index(1))
                .arg(Arg::new("resource").help("Repository-relative target path").required(true).index(2)),
        )
        .subcommand(
            Command::new("put-dir")
                .about("Upload a local directory tree, creating missing collections")
                .arg(Arg::new("directory").help("Local directory to upload").required(true).index(1))
                .arg(Arg::new("destination").help("Repository-relative target directory, the root when omitted").index(2)),
        )
        .subcommand(
            Command::new("get")
                .about("Download a resource")
                .arg(Arg::new("resource").help("Repository-relative resource path").required(true).index(1))
                .arg(Arg::new("destination").help("Local destination file").required(true).index(2)),
        )
        .subcommand(
            Command::new("ls")
                .about("List the members of a collection")
                .arg(Arg::new("directory").help("Repository-relative directory, the root when omitted").index(1))
                .arg(
                    Arg::new("json")
                        .help("Print the listing as JSON")
                        .long("json")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("exists")
                .about("Check whether a resource exists")
                .arg(Arg::new("resource").help("Repository-relative resource path").required(true).index(1)),
        )
        .subcommand(
            Command::new("mkdir")
                .about("Create a single collection, failing if it exists")
                .arg(Arg::new("directory").help("Repository-relative directory").required(true).index(1)),
        )
        .subcommand(
            Command::new("propfind")
                .about("Run a PROPFIND and print the parsed multistatus as JSON")
                .arg(Arg::new("path").help("Repository-relative path, the root when omitted").index(1))
                .arg(
                    Arg::new("depth")
                        .help("Depth header: 0, 1 or infinity")
                        .long("depth")
                        .short('d')
                        .value_name("DEPTH")
                        .default_value("1"),
                ),
        )
}

fn optional_arg<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches.get_one::<String>(name).map(String::as_str).unwrap_or("")
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument: {}", name))
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("artifact_dav=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();

    let matches = cli().get_matches();

    let config = Config::from_env()?;
    let wagon = WebDAVWagon::new(config.webdav_config())?;

    let outcome = run(&wagon, &matches).await;
    if let Err(e) = &outcome {
        if let Some(wagon_error) = e.downcast_ref::<artifact_dav::WagonError>() {
            error!("❌ {} [{}]", wagon_error, wagon_error.error_code());
            if let Some(action) = wagon_error.suggested_action() {
                eprintln!("Hint: {}", action);
            }
        }
    }
    outcome
}

async fn run<T: DavTransport>(wagon: &WebDAVWagon<T>, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("put", sub)) => {
            let file = arg(sub, "file")?;
            let resource = arg(sub, "resource")?;
            wagon.put(Path::new(file), resource).await?;
            println!("Uploaded {} to {}", file, wagon.url_manager().relative_path_to_url(resource));
        }
        Some(("put-dir", sub)) => {
            let directory = arg(sub, "directory")?;
            let destination = optional_arg(sub, "destination");
            let uploaded = wagon.put_directory(Path::new(directory), destination).await?;
            println!(
                "Uploaded {} files from {} to {}",
                uploaded,
                directory,
                wagon.url_manager().collection_url(destination)
            );
        }
        Some(("get", sub)) => {
            let resource = arg(sub, "resource")?;
            let destination = arg(sub, "destination")?;
            wagon.get(resource, Path::new(destination)).await?;
            println!("Downloaded {} to {}", resource, destination);
        }
        Some(("ls", sub)) => {
            let names = wagon.get_file_list(optional_arg(sub, "directory")).await?;
            if sub.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else {
                for name in names {
                    println!("{}", name);
                }
            }
        }
        Some(("exists", sub)) => {
            let resource = arg(sub, "resource")?;
            let exists = wagon.resource_exists(resource).await?;
            println!("{}", exists);
            if !exists {
                return Err(anyhow!("{} does not exist", resource));
            }
        }
        Some(("mkdir", sub)) => {
            let directory = arg(sub, "directory")?;
            wagon.create_collection(directory).await?;
            println!("Created {}", wagon.url_manager().collection_url(directory));
        }
        Some(("propfind", sub)) => {
            let depth: Depth = arg(sub, "depth")?.parse().map_err(|e: String| anyhow!(e))?;
            let path = optional_arg(sub, "path");
            let url = match depth {
                Depth::Zero => wagon.url_manager().relative_path_to_url(path),
                _ => wagon.url_manager().collection_url(path),
            };
            match wagon.propfind(&url, depth).await? {
                Some(multistatus) => {
                    let mut resources: Vec<&DavResource> = multistatus.resources().collect();
                    resources.sort_by(|a, b| a.href.cmp(&b.href));
                    println!("{}", serde_json::to_string_pretty(&resources)?);
                }
                None => return Err(anyhow!("No DAV multistatus returned for {}", url)),
            }
        }
        _ => unreachable!("subcommand_required is set"),
    }

    Ok(())
}
