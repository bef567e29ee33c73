use std::collections::HashMap;

/// Distributes a requested question count across chapters in proportion
/// to their chunk volume. Every chapter with chunks gets at least one
/// question; rounding drift is corrected against the largest quota.
pub fn allocate(chunk_counts: &HashMap<String, usize>, requested: usize) -> HashMap<String, usize> {
    let total_chunks: usize = chunk_counts.values().sum();
    let mut quotas = HashMap::new();
    if total_chunks == 0 {
        return quotas;
    }

    let mut remaining = requested as i64;
    for (chapter, count) in chunk_counts {
        let proportion = *count as f64 / total_chunks as f64;
        let quota = (proportion * requested as f64).round() as i64;
        let quota = quota.max(1) as usize;
        quotas.insert(chapter.clone(), quota);
        remaining -= quota as i64;
    }

    // Over-allocated: shave the largest quota, but never below the floor.
    while remaining < 0 {
        let largest = largest_chapter(&quotas);
        match quotas.get_mut(&largest) {
            Some(quota) if *quota > 1 => {
                *quota -= 1;
                remaining += 1;
            }
            _ => break,
        }
    }

    // Under-allocated: top up the largest quota.
    while remaining > 0 {
        let largest = largest_chapter(&quotas);
        if let Some(quota) = quotas.get_mut(&largest) {
            *quota += 1;
        }
        remaining -= 1;
    }

    quotas
}

/// Largest quota, ties broken by chapter name so the result is stable.
fn largest_chapter(quotas: &HashMap<String, usize>) -> String {
    let mut entries: Vec<(&String, &usize)> = quotas.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries[0].0.clone()
}
