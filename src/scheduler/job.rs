use crate::casting::VoiceMap;
use crate::error::{Result, StoryvoxError};
use crate::script::models::ScriptSegment;

/// Состояние задания
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Active,
    Done,
    Requeued,
    Dropped,
}

/// Задание на синтез одного сегмента
#[derive(Debug, Clone)]
pub struct Job {
    /// Позиция сегмента в сценарии; определяет место в итоговой дорожке
    pub segment_index: usize,
    pub segment: ScriptSegment,
    pub voice_name: String,
    /// Сколько попыток уже сделано
    pub attempts: u32,
    pub state: JobState,
}

impl Job {
    pub fn new(segment_index: usize, segment: ScriptSegment, voice_name: impl Into<String>) -> Self {
        Self {
            segment_index,
            segment,
            voice_name: voice_name.into(),
            attempts: 0,
            state: JobState::Pending,
        }
    }
}

/// Построить очередь заданий по сценарию и распределению голосов
pub fn build_jobs(segments: &[ScriptSegment], voices: &VoiceMap) -> Result<Vec<Job>> {
    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let voice = voices.get(&segment.speaker).ok_or_else(|| {
                StoryvoxError::Casting(format!("no voice assigned to speaker {}", segment.speaker))
            })?;
            Ok(Job::new(index, segment.clone(), voice.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_jobs() {
        let mut voices = VoiceMap::new();
        voices.insert("A".to_string(), "Kore".to_string());
        voices.insert("B".to_string(), "Puck".to_string());
        let segments = vec![ScriptSegment::new("A", "x"), ScriptSegment::new("B", "y")];

        let jobs = build_jobs(&segments, &voices).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].segment_index, 1);
        assert_eq!(jobs[1].voice_name, "Puck");
        assert_eq!(jobs[0].state, JobState::Pending);
    }

    #[test]
    fn test_build_jobs_missing_voice() {
        let segments = vec![ScriptSegment::new("Nobody", "x")];
        assert!(matches!(
            build_jobs(&segments, &VoiceMap::new()),
            Err(StoryvoxError::Casting(_))
        ));
    }
}
