//! Модуль для оптимизации сценария перед генерацией речи
//!
//! Подряд идущие реплики одного персонажа склеиваются в один сегмент, пока
//! длина результата не превышает предел. Это сокращает число запросов к API.

use super::models::ScriptSegment;

/// Предел длины объединённого сегмента по умолчанию
pub const DEFAULT_MAX_SEGMENT_CHARS: usize = 800;

/// Объединение коротких реплик одного персонажа
///
/// Порядок сегментов сохраняется; реплики разных персонажей не смешиваются
/// и ни одна реплика не теряется. Пробелы внутри текста нормализуются.
pub fn optimize(script: &[ScriptSegment], max_chars: usize) -> Vec<ScriptSegment> {
    let mut optimized: Vec<ScriptSegment> = Vec::new();
    let mut current: Option<(ScriptSegment, usize)> = None;

    for segment in script {
        let text = normalize_whitespace(&segment.text);
        let text_len = text.chars().count();

        if let Some((acc, acc_len)) = current.as_mut() {
            let separator = usize::from(*acc_len > 0 && text_len > 0);
            let merged_len = *acc_len + separator + text_len;
            if acc.speaker == segment.speaker && merged_len <= max_chars {
                if separator > 0 {
                    acc.text.push(' ');
                }
                acc.text.push_str(&text);
                *acc_len = merged_len;
                continue;
            }
        }

        if let Some((done, _)) = current.take() {
            optimized.push(done);
        }
        current = Some((ScriptSegment::new(segment.speaker.clone(), text), text_len));
    }

    if let Some((done, _)) = current {
        optimized.push(done);
    }

    log::debug!("Optimized script: {} -> {} segments", script.len(), optimized.len());
    optimized
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(speaker: &str, text: &str) -> ScriptSegment {
        ScriptSegment::new(speaker, text)
    }

    #[test]
    fn test_merges_consecutive_same_speaker() {
        let script = vec![seg("A", "x"), seg("A", "y"), seg("B", "z")];
        let result = optimize(&script, 3);
        assert_eq!(result, vec![seg("A", "x y"), seg("B", "z")]);
    }

    #[test]
    fn test_does_not_merge_across_speakers() {
        let script = vec![seg("A", "one"), seg("B", "two"), seg("A", "three")];
        let result = optimize(&script, DEFAULT_MAX_SEGMENT_CHARS);
        assert_eq!(result, script);
    }

    #[test]
    fn test_starts_new_segment_at_cap() {
        let script = vec![seg("A", "aaaa"), seg("A", "bbbb"), seg("A", "cccc")];
        // "aaaa bbbb" = 9 символов, третья реплика уже не помещается
        let result = optimize(&script, 10);
        assert_eq!(result, vec![seg("A", "aaaa bbbb"), seg("A", "cccc")]);
    }

    #[test]
    fn test_oversized_segment_kept_whole() {
        let long = "w".repeat(20);
        let script = vec![seg("A", &long), seg("A", "tail")];
        let result = optimize(&script, 10);
        assert_eq!(result, vec![seg("A", &long), seg("A", "tail")]);
    }

    #[test]
    fn test_empty_input() {
        assert!(optimize(&[], DEFAULT_MAX_SEGMENT_CHARS).is_empty());
    }

    #[test]
    fn test_normalizes_whitespace_when_merging() {
        let script = vec![seg("A", "  hello \n world "), seg("A", "   "), seg("A", "again")];
        let result = optimize(&script, DEFAULT_MAX_SEGMENT_CHARS);
        assert_eq!(result, vec![seg("A", "hello world again")]);
    }

    #[test]
    fn test_blank_line_keeps_speaker_boundary() {
        let script = vec![seg("A", "x"), seg("B", "   "), seg("A", "y")];
        let result = optimize(&script, DEFAULT_MAX_SEGMENT_CHARS);
        assert_eq!(result, vec![seg("A", "x"), seg("B", ""), seg("A", "y")]);
    }

    #[test]
    fn test_cap_counts_characters_not_bytes() {
        let script = vec![seg("A", "привет"), seg("A", "мир")];
        // 6 + 1 + 3 = 10 символов, но 19 байт
        let result = optimize(&script, 10);
        assert_eq!(result, vec![seg("A", "привет мир")]);
    }
}
