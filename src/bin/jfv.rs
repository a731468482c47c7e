use std::io::{self, Write as _};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute, queue,
    terminal::{
        BeginSynchronizedUpdate, EndSynchronizedUpdate, EnterAlternateScreen,
        LeaveAlternateScreen, SetTitle, disable_raw_mode, enable_raw_mode,
    },
};
use ratatui::{Terminal, backend::CrosstermBackend};

use jfx::app::App;
use jfx::logging;

/// Terminal hex viewer for firmware images
#[derive(Parser, Debug)]
#[command(name = "jfv")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to open
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Append logs to this file
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 画面を占有するのでログはファイルにだけ出す
    if let Some(ref log) = args.log {
        logging::init_tracing_file(log, "info")
            .with_context(|| format!("Failed to open log file {}", log.display()))?;
    }

    // 端末を触る前に読み込む（エラーを普通に表示するため）
    let mut app = App::new();
    app.open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;

    // ターミナルの初期化
    // Alternate Screenでトラックパッドスクロールによるバッファ移動を防止
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // ターミナルの後処理
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        tracing::error!(error = %e, "viewer stopped");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let mut shown_modified = app.is_modified();
    update_title(terminal.backend_mut(), app)?;

    // メインループ
    loop {
        // Synchronized Update: 描画のちらつきを防止
        queue!(terminal.backend_mut(), BeginSynchronizedUpdate)?;
        terminal.draw(|f| app.draw(f))?;
        queue!(terminal.backend_mut(), EndSynchronizedUpdate)?;
        terminal.backend_mut().flush()?;

        app.handle_event()?;

        if app.should_quit() {
            break;
        }

        // 変更フラグが変わったらタイトルを更新
        if app.is_modified() != shown_modified {
            shown_modified = app.is_modified();
            update_title(terminal.backend_mut(), app)?;
        }
    }

    Ok(())
}

/// ウィンドウタイトルを更新
fn update_title(backend: &mut CrosstermBackend<io::Stdout>, app: &App) -> Result<()> {
    let title = format!(
        "jfv - {}{}",
        app.filename().unwrap_or("[No File]"),
        if app.is_modified() { " [+]" } else { "" }
    );
    execute!(backend, SetTitle(&title))?;
    Ok(())
}
