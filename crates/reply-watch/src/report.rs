use reply_coordination::{ResponseSample, UserId};

/// Render the `!avgtime` report, one line per owner.
pub fn render(report: &[(UserId, ResponseSample)]) -> String {
    let lines: Vec<String> = report
        .iter()
        .filter_map(|(owner, sample)| {
            sample.mean().map(|mean| {
                format!(
                    "- {}: {:.1}s average (based on {} replies)",
                    owner.mention(),
                    mean.as_secs_f64(),
                    sample.count
                )
            })
        })
        .collect();

    if lines.is_empty() {
        return "No response times recorded yet.".to_string();
    }
    format!("Supervisor average response times:\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]), "No response times recorded yet.");
    }

    #[test]
    fn test_render_lines() {
        let report = vec![
            (
                UserId::from("1"),
                ResponseSample {
                    total: Duration::from_millis(24_600),
                    count: 2,
                },
            ),
            (
                UserId::from("2"),
                ResponseSample {
                    total: Duration::from_secs(5),
                    count: 1,
                },
            ),
        ];
        assert_eq!(
            render(&report),
            "Supervisor average response times:\n\
             - <@1>: 12.3s average (based on 2 replies)\n\
             - <@2>: 5.0s average (based on 1 replies)"
        );
    }
}
