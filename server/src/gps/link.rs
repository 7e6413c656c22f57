use log::{info, warn};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Delay before respawning a dead GPS producer.
const RESPAWN_DELAY: Duration = Duration::from_secs(5);

/// Supervises the gpsd line producer: spawn, stream stdout lines into the
/// channel, and on any exit respawn after a fixed delay. Runs until the
/// receiving side of the channel goes away.
pub async fn run(command: Vec<String>, tx: mpsc::Sender<String>) {
    loop {
        match spawn_and_stream(&command, &tx).await {
            StreamEnd::ReceiverGone => return,
            StreamEnd::ProducerDied => {
                warn!(
                    "gps producer exited, respawning in {}s",
                    RESPAWN_DELAY.as_secs()
                );
                tokio::time::sleep(RESPAWN_DELAY).await;
            }
        }
    }
}

enum StreamEnd {
    ProducerDied,
    ReceiverGone,
}

async fn spawn_and_stream(command: &[String], tx: &mpsc::Sender<String>) -> StreamEnd {
    let (program, args) = match command.split_first() {
        Some(split) => split,
        None => {
            warn!("empty gps command configured");
            return StreamEnd::ProducerDied;
        }
    };

    let mut child = match Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            warn!("failed to spawn gps producer {}: {}", program, err);
            return StreamEnd::ProducerDied;
        }
    };

    info!("gps producer {} running", program);
    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => return StreamEnd::ProducerDied,
    };
    let mut lines = BufReader::new(stdout).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).await.is_err() {
                    return StreamEnd::ReceiverGone;
                }
            }
            Ok(None) => return StreamEnd::ProducerDied,
            Err(err) => {
                warn!("gps producer read error: {}", err);
                return StreamEnd::ProducerDied;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lines_flow_from_a_child_process() {
        let (tx, mut rx) = mpsc::channel(8);
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "printf 'one\\ntwo\\n'".to_string(),
        ];
        let end = spawn_and_stream(&command, &tx).await;
        assert!(matches!(end, StreamEnd::ProducerDied));
        assert_eq!(rx.recv().await.unwrap(), "one");
        assert_eq!(rx.recv().await.unwrap(), "two");
    }

    #[tokio::test]
    async fn missing_binary_reports_a_dead_producer() {
        let (tx, _rx) = mpsc::channel(1);
        let command = vec!["/nonexistent/gpspipe".to_string()];
        let end = spawn_and_stream(&command, &tx).await;
        assert!(matches!(end, StreamEnd::ProducerDied));
    }
}
