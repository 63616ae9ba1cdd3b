use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use repo_ask::config::Config;
use repo_ask::session::SessionState;
use repo_ask::state::{AppState, QuestionOutcome};

const HELP: &str = "\
Commands:
  search                     ask a new question about a repository
  ask <file> <block> <row>   ask about one line of the results
  show                       print the results again
  reset                      discard results and annotations
  quit                       exit
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    tracing::info!("Backend: {}", config.base_url);

    let state = AppState::new(config)?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    print!("{HELP}");
    run_search(&state, &mut input).await?;

    while let Some(line) = prompt(&mut input, "> ").await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => {}
            ["search"] => run_search(&state, &mut input).await?,
            ["ask", file, block, row] => ask(&state, &mut input, file, block, row).await?,
            ["show"] => match state.render_text() {
                Some(text) => print!("{text}"),
                None => println!("No results yet."),
            },
            ["reset"] => state.reset(),
            ["quit"] | ["exit"] => break,
            _ => print!("{HELP}"),
        }
    }

    Ok(())
}

async fn prompt(input: &mut Lines<BufReader<Stdin>>, label: &str) -> anyhow::Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;
    input.next_line().await.context("Failed to read stdin")
}

async fn run_search(state: &AppState, input: &mut Lines<BufReader<Stdin>>) -> anyhow::Result<()> {
    let Some(url) = prompt(input, "Repository URL: ").await? else {
        return Ok(());
    };
    let Some(question) = prompt(input, "Question: ").await? else {
        return Ok(());
    };

    println!("Searching...");
    match state.submit(url.trim(), question.trim()).await {
        SessionState::Ready(_) => {
            if let Some(text) = state.render_text() {
                print!("{text}");
            }
        }
        SessionState::Error(message) => println!("{message}"),
        SessionState::Idle | SessionState::Loading => {}
    }
    Ok(())
}

async fn ask(
    state: &AppState,
    input: &mut Lines<BufReader<Stdin>>,
    file: &str,
    block: &str,
    row: &str,
) -> anyhow::Result<()> {
    let (Ok(block), Ok(row)) = (block.parse::<usize>(), row.parse::<u32>()) else {
        println!("Block and row must be numbers.");
        return Ok(());
    };
    let Some(range) = state.block_range(file, block) else {
        println!("No block {block} in {file}.");
        return Ok(());
    };
    if !state.open_dialog_at(file, range, row) {
        println!("Row {row} is outside lines {}:{}.", range.start, range.end);
        return Ok(());
    }

    loop {
        let Some(text) = prompt(input, "Your question (empty to cancel): ").await? else {
            state.close_dialog();
            return Ok(());
        };
        if text.trim().is_empty() {
            state.close_dialog();
            return Ok(());
        }

        println!("Thinking...");
        match state.submit_question(&text).await {
            QuestionOutcome::Answered(answer) => {
                println!("{answer}");
                let keep = prompt(input, "Keep this answer? [Y/n] ").await?;
                if keep.is_some_and(|k| k.trim().eq_ignore_ascii_case("n")) {
                    state.close_dialog();
                } else {
                    state.commit();
                }
                return Ok(());
            }
            QuestionOutcome::Failed(message) => println!("{message}"),
            QuestionOutcome::Rejected | QuestionOutcome::Discarded => {
                state.close_dialog();
                return Ok(());
            }
        }
    }
}
