//! Operator prompt between pages for `search --interactive`.

use async_trait::async_trait;
use grocery_core::Product;
use grocery_scraper::{GateDecision, PageGate};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};

const PREVIEW_ROWS: usize = 5;

/// Reads `c`/`s`/`p` answers line by line. End of input stops paging.
pub(crate) struct LineGate<R> {
    input: R,
}

impl LineGate<BufReader<Stdin>> {
    pub(crate) fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> LineGate<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub(crate) fn new(input: R) -> Self {
        Self { input }
    }

    async fn read_answer(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line).await {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_lowercase()),
        }
    }
}

fn preview(collected: &[Product]) {
    let start = collected.len().saturating_sub(PREVIEW_ROWS);
    for product in &collected[start..] {
        eprintln!("  {:<50} {}", product.title, product.price);
    }
}

#[async_trait]
impl<R> PageGate for LineGate<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn confirm(&mut self, completed_page: u32, collected: &[Product]) -> GateDecision {
        loop {
            eprint!(
                "page {completed_page} done, {} products so far. [c]ontinue, [s]top, [p]review? ",
                collected.len()
            );
            let Some(answer) = self.read_answer().await else {
                return GateDecision::Stop;
            };
            match answer.as_str() {
                "" | "c" | "continue" => return GateDecision::Continue,
                "s" | "stop" | "q" => return GateDecision::Stop,
                "p" | "preview" => preview(collected),
                other => eprintln!("unrecognised answer '{other}'"),
            }
        }
    }
}
