use std::io::{self, BufRead, Write};
use tracing::warn;

use super::{Decision, DecisionSource};
use crate::clustering::Cluster;
use crate::TARGET_SESSION;

/// Token that stops the session.
pub const QUIT_TOKEN: &str = "q";

/// A parsed prompt answer, before range checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Quit,
    Option(usize),
    Invalid,
}

/// Parses one line of operator input. Surrounding whitespace and trailing
/// periods are ignored, so `1.` reads as option 1.
pub fn parse_answer(line: &str) -> Answer {
    let answer = line.trim().trim_end_matches('.');
    if answer == QUIT_TOKEN {
        return Answer::Quit;
    }
    answer.parse::<usize>().map_or(Answer::Invalid, Answer::Option)
}

/// Maps an answer onto a cluster with `members` entries. `None` means the
/// answer is unusable and the operator has to be asked again.
pub fn to_decision(answer: Answer, members: usize) -> Option<Decision> {
    match answer {
        Answer::Quit => Some(Decision::Abort),
        Answer::Option(0) => Some(Decision::RetainAll),
        Answer::Option(k) if k <= members => Some(Decision::MergeTo(k)),
        Answer::Option(_) | Answer::Invalid => None,
    }
}

/// Line-oriented operator prompt over any reader/writer pair.
///
/// Out-of-range or unparsable answers are met with a re-prompt stating the
/// valid range, as many times as needed. End of input counts as quitting.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn render(&mut self, cluster: &Cluster) -> io::Result<()> {
        writeln!(self.output, "Artists similar to \"{}\":", cluster.pivot().name)?;
        writeln!(self.output, "0. Retain all")?;
        for (index, member) in cluster.members().iter().enumerate() {
            writeln!(
                self.output,
                "{}. {} (edit distance {})",
                index + 1,
                member.name,
                member.distance
            )?;
        }
        Ok(())
    }

    /// Reads one line, `None` at end of input.
    fn read_answer(&mut self) -> io::Result<Option<String>> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    fn stop(&mut self) -> io::Result<Decision> {
        writeln!(self.output, "Stopping")?;
        Ok(Decision::Abort)
    }
}

impl<R: BufRead, W: Write> DecisionSource for ConsolePrompt<R, W> {
    fn begin(&mut self, threshold: usize) -> io::Result<()> {
        writeln!(self.output, "Press '{}' to quit", QUIT_TOKEN)?;
        writeln!(self.output, "Using an edit distance of {}", threshold)?;
        Ok(())
    }

    fn decide(&mut self, cluster: &Cluster) -> io::Result<Decision> {
        self.render(cluster)?;
        write!(self.output, "Choose option: ")?;

        loop {
            let Some(line) = self.read_answer()? else {
                writeln!(self.output)?;
                return self.stop();
            };

            match to_decision(parse_answer(&line), cluster.len()) {
                Some(Decision::Abort) => return self.stop(),
                Some(decision) => return Ok(decision),
                None => {
                    warn!(
                        target: TARGET_SESSION,
                        "Rejected answer {:?} for a cluster of {}", line.trim(), cluster.len()
                    );
                    write!(
                        self.output,
                        "Please choose an option between 0 and {}: ",
                        cluster.len()
                    )?;
                }
            }
        }
    }
}
