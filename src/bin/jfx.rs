//! jfx - J-Flash front-end
//!
//! Manage flashing profiles, patch project files, run J-Flash and convert
//! binaries to and from hex dumps.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use jfx::buffer::Document;
use jfx::codec;
use jfx::config::{self, PatchOutcome};
use jfx::flash::{DEFAULT_PROGRAM, FlashCommand, locate_program};
use jfx::logging;
use jfx::profile::{Profile, ProfileStore, Slot};
use jfx::project::{self, SWD_SPEEDS_KHZ};

/// J-Flash front-end
#[derive(Parser, Debug)]
#[command(name = "jfx")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Profile settings file
    #[arg(long, global = true, env = "JFX_SETTINGS", default_value = "settings.json")]
    settings: PathBuf,

    /// J-Flash executable (name looked up in PATH, or a path)
    #[arg(long, global = true, env = "JFX_JFLASH", default_value = DEFAULT_PROGRAM)]
    jflash: String,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage flashing profiles
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },

    /// Show or set the SWD speed (kHz) in a profile's project file
    Speed {
        /// Profile name
        profile: String,

        /// New speed in kHz
        khz: Option<u32>,
    },

    /// Read or patch a value in a project file
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Run J-Flash with a profile
    Flash {
        /// Profile name
        profile: String,

        /// Only print the command line
        #[arg(long)]
        dry_run: bool,
    },

    /// Print a hex dump of a file
    Dump {
        /// File to dump
        file: PathBuf,

        /// Which pane to print
        #[arg(short, long, value_enum, default_value_t = Pane::Both)]
        pane: Pane,
    },

    /// Convert an edited hex pane back into a binary file
    Undump {
        /// Hex text file (default: stdin)
        input: Option<PathBuf>,

        /// Binary file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Input has no offset column
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// List profile names
    List,

    /// Show one profile
    Show { name: String },

    /// Create a profile with default addresses
    Add { name: String },

    /// Delete a profile
    Remove { name: String },

    /// Change fields of a profile
    Set(SetArgs),
}

#[derive(clap::Args, Debug)]
struct SetArgs {
    /// Profile name
    name: String,

    /// J-Flash project file (.jflash)
    #[arg(long)]
    project: Option<String>,

    /// J-Link USB serial ("" for the first probe)
    #[arg(long)]
    serial: Option<String>,

    /// Erase the whole chip before programming
    #[arg(long)]
    chip_erase: Option<bool>,

    /// Bootloader image (enables the slot and picks its usual address)
    #[arg(long)]
    bootloader: Option<String>,

    #[arg(long, value_name = "HEX")]
    bootloader_addr: Option<String>,

    /// Application image
    #[arg(long)]
    image: Option<String>,

    #[arg(long, value_name = "HEX")]
    image_addr: Option<String>,

    /// Parameter image
    #[arg(long)]
    param: Option<String>,

    #[arg(long, value_name = "HEX")]
    param_addr: Option<String>,

    /// Slots to enable
    #[arg(long, value_enum)]
    enable: Vec<Slot>,

    /// Slots to disable
    #[arg(long, value_enum)]
    disable: Vec<Slot>,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print a value
    Get {
        file: PathBuf,
        section: String,
        key: String,
    },

    /// Rewrite or insert a value
    Set {
        file: PathBuf,
        section: String,
        key: String,
        value: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Pane {
    Both,
    Hex,
    Ascii,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = logging::level_for(args.verbose);
    if args.log_json {
        logging::init_tracing_json(level);
    } else {
        logging::init_tracing(level);
    }

    match args.command {
        Command::Profile { action } => cmd_profile(&args.settings, action),
        Command::Speed { profile, khz } => cmd_speed(&args.settings, &profile, khz),
        Command::Config { action } => cmd_config(action),
        Command::Flash { profile, dry_run } => {
            cmd_flash(&args.settings, &args.jflash, &profile, dry_run)
        }
        Command::Dump { file, pane } => cmd_dump(&file, pane),
        Command::Undump { input, output, raw } => cmd_undump(input.as_ref(), &output, raw),
    }
}

fn load_store(settings: &PathBuf) -> Result<ProfileStore> {
    ProfileStore::load(settings)
        .with_context(|| format!("Failed to load settings from {}", settings.display()))
}

fn print_profile(p: &Profile) {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!("name:       {}", p.name);
    println!("project:    {}", p.project_file);
    println!("serial:     {}", p.serial);
    println!("chip erase: {}", yes_no(p.chip_erase));
    for slot in Slot::ALL {
        let image = p.slot(slot);
        println!(
            "{:<11} [{}] {} {}",
            format!("{}:", slot.label()),
            if image.enabled { "x" } else { " " },
            image.address,
            image.path
        );
    }
}

// === Commands ===

fn cmd_profile(settings: &PathBuf, action: ProfileCommand) -> Result<()> {
    let mut store = load_store(settings)?;

    match action {
        ProfileCommand::List => {
            for p in store.profiles() {
                println!("{}", p.name);
            }
        }
        ProfileCommand::Show { name } => print_profile(store.get(&name)?),
        ProfileCommand::Add { name } => {
            store.add(&name)?;
            store.save()?;
            println!("Added profile '{}'", name.trim());
        }
        ProfileCommand::Remove { name } => {
            let removed = store.remove(&name)?;
            store.save()?;
            println!("Removed profile '{}'", removed.name);
        }
        ProfileCommand::Set(set) => {
            let mut profile = store.get(&set.name)?.clone();
            apply_set(&mut profile, set);
            print_profile(&profile);
            store.commit(profile)?;
            store.save()?;
        }
    }
    Ok(())
}

fn apply_set(profile: &mut Profile, set: SetArgs) {
    if let Some(project) = set.project {
        profile.project_file = project.trim().to_string();
    }
    if let Some(serial) = set.serial {
        profile.serial = serial.trim().to_string();
    }
    if let Some(chip_erase) = set.chip_erase {
        profile.chip_erase = chip_erase;
    }

    let slots = [
        (Slot::Bootloader, set.bootloader, set.bootloader_addr),
        (Slot::Image, set.image, set.image_addr),
        (Slot::Param, set.param, set.param_addr),
    ];
    for (slot, path, address) in slots {
        let image = profile.slot_mut(slot);
        if let Some(path) = path {
            image.select(path.trim());
        }
        if let Some(address) = address {
            image.address = address.trim().to_string();
        }
    }

    for slot in set.enable {
        profile.slot_mut(slot).enabled = true;
    }
    for slot in set.disable {
        profile.slot_mut(slot).enabled = false;
    }
}

fn cmd_speed(settings: &PathBuf, name: &str, khz: Option<u32>) -> Result<()> {
    let store = load_store(settings)?;
    let profile = store.get(name)?;
    if profile.project_file.is_empty() {
        bail!("Profile '{}' has no project file", name);
    }

    match khz {
        None => {
            let speed = project::swd_speed(&profile.project_file)?;
            println!("{} kHz", speed);
        }
        Some(khz) => {
            if let Err(e) = project::set_swd_speed(&profile.project_file, khz) {
                let list = SWD_SPEEDS_KHZ.map(|s| s.to_string()).join(", ");
                return Err(e).with_context(|| format!("Supported speeds (kHz): {}", list));
            }
            println!("SWD speed set to {} kHz", khz);
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigCommand) -> Result<()> {
    match action {
        ConfigCommand::Get { file, section, key } => {
            println!("{}", config::read(&file, &section, &key)?);
        }
        ConfigCommand::Set {
            file,
            section,
            key,
            value,
        } => {
            if config::write(&file, &section, &key, &value)? == PatchOutcome::SectionMissing {
                eprintln!(
                    "warning: section [{}] not found in {}; nothing written",
                    section,
                    file.display()
                );
            }
        }
    }
    Ok(())
}

fn cmd_flash(settings: &PathBuf, jflash: &str, name: &str, dry_run: bool) -> Result<()> {
    let store = load_store(settings)?;
    let profile = store.get(name)?;

    let command = if dry_run {
        FlashCommand::preview(profile, jflash)?
    } else {
        FlashCommand::build(profile, locate_program(jflash)?)?
    };

    println!("Running command:\n{}\n", command.display());
    if dry_run {
        return Ok(());
    }

    let task = command.spawn()?;
    let report = task.wait(|line| println!("{}", line));
    println!(
        "\n--- Finished in {:.2} seconds ---",
        report.elapsed.as_secs_f64()
    );

    if !report.success() {
        match report.exit_code {
            Some(code) => bail!("J-Flash exited with code {}", code),
            None => bail!("J-Flash was terminated"),
        }
    }
    Ok(())
}

fn cmd_dump(file: &PathBuf, pane: Pane) -> Result<()> {
    let data = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let mut out = io::stdout().lock();

    match pane {
        Pane::Both => {
            for row in codec::rows(&data) {
                writeln!(out, "{}  {}", row.hex_line(), row.ascii)?;
            }
        }
        Pane::Hex | Pane::Ascii => {
            let dump = codec::encode(&data);
            let text = if pane == Pane::Hex { dump.hex } else { dump.ascii };
            if !text.is_empty() {
                writeln!(out, "{}", text)?;
            }
        }
    }
    Ok(())
}

fn cmd_undump(input: Option<&PathBuf>, output: &PathBuf, raw: bool) -> Result<()> {
    let text = match input {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read {}", p.display()))?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    let groups = if raw { text } else { codec::strip_offsets(&text) };
    let mut document = Document::new();
    document.apply_hex_text(&groups)?;
    document
        .save_as(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    eprintln!("Wrote {} bytes to {}", document.len(), output.display());
    Ok(())
}
