use std::collections::VecDeque;

use rand::seq::SliceRandom;

use crate::{error::PlayerError, player::source::QueueEntry};

/// Cola ordenada de entradas pendientes de una sesión.
///
/// No tiene lógica de concurrencia propia: siempre se accede bajo el lock de
/// la `PlaybackSession` que la posee. Todas las operaciones indexadas validan
/// `0 <= i < len` antes de mutar; un índice fuera de rango falla con
/// `IndexOutOfRange` y deja la cola intacta. No hay límite de tamaño.
#[derive(Debug, Default)]
pub struct SessionQueue {
    entries: VecDeque<QueueEntry>,
}

impl SessionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega una entrada al final de la cola.
    pub fn enqueue(&mut self, entry: QueueEntry) {
        self.entries.push_back(entry);
    }

    /// Extrae la cabeza de la cola. Solo lo usa el consumer loop.
    pub(crate) fn dequeue(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Quita y devuelve la entrada en la posición `index`; las siguientes se
    /// corren una posición hacia el frente.
    pub fn remove_at(&mut self, index: usize) -> Result<QueueEntry, PlayerError> {
        self.check_bounds(index)?;
        let Some(entry) = self.entries.remove(index) else {
            return Err(self.out_of_range(index));
        };
        Ok(entry)
    }

    /// Intercambia las entradas en `i` y `j`. No hace nada si `i == j`.
    pub fn swap(&mut self, i: usize, j: usize) -> Result<(), PlayerError> {
        self.check_bounds(i)?;
        self.check_bounds(j)?;
        if i != j {
            self.entries.swap(i, j);
        }
        Ok(())
    }

    /// Mueve la entrada en `index` al frente de la cola (la usa skip-to).
    pub fn move_to_front(&mut self, index: usize) -> Result<(), PlayerError> {
        self.check_bounds(index)?;
        let Some(entry) = self.entries.remove(index) else {
            return Err(self.out_of_range(index));
        };
        self.entries.push_front(entry);
        Ok(())
    }

    /// Permutación uniforme de las entradas pendientes. La entrada en
    /// reproducción no vive en esta colección, así que nunca se ve afectada.
    pub fn shuffle(&mut self) {
        self.entries
            .make_contiguous()
            .shuffle(&mut rand::thread_rng());
    }

    /// Vacía la cola. No detiene la entrada en reproducción.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Título de la entrada en `index`, solo para mostrar.
    pub fn title_at(&self, index: usize) -> Result<&str, PlayerError> {
        self.check_bounds(index)?;
        self.entries
            .get(index)
            .map(|entry| entry.title())
            .ok_or_else(|| self.out_of_range(index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copia puntual de la cola, segura de iterar mientras la cola viva sigue
    /// mutando bajo el lock de la sesión.
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.entries.iter().cloned().collect()
    }

    fn check_bounds(&self, index: usize) -> Result<(), PlayerError> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(self.out_of_range(index))
        }
    }

    fn out_of_range(&self, index: usize) -> PlayerError {
        // Los errores reportan la posición como la ve el operador (base 1).
        PlayerError::IndexOutOfRange {
            given: index as i64 + 1,
            len: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    use super::*;
    use crate::player::source::PlayableSource;

    fn entry(title: &str) -> QueueEntry {
        QueueEntry::new(
            PlayableSource::new(title, format!("https://example.com/{title}")),
            UserId::new(42),
        )
    }

    fn queue_of(titles: &[&str]) -> SessionQueue {
        let mut queue = SessionQueue::new();
        for title in titles {
            queue.enqueue(entry(title));
        }
        queue
    }

    fn titles(queue: &SessionQueue) -> Vec<String> {
        queue
            .snapshot()
            .iter()
            .map(|e| e.title().to_string())
            .collect()
    }

    #[test]
    fn swap_twice_restores_original_order() {
        let mut queue = queue_of(&["a", "b", "c", "d"]);
        let before = titles(&queue);

        queue.swap(0, 3).unwrap();
        assert_eq!(titles(&queue), vec!["d", "b", "c", "a"]);
        queue.swap(0, 3).unwrap();
        assert_eq!(titles(&queue), before);
    }

    #[test]
    fn swap_same_index_is_noop() {
        let mut queue = queue_of(&["a", "b"]);
        queue.swap(1, 1).unwrap();
        assert_eq!(titles(&queue), vec!["a", "b"]);
    }

    #[test]
    fn swap_out_of_range_leaves_queue_untouched() {
        let mut queue = queue_of(&["a", "b"]);
        let err = queue.swap(0, 2).unwrap_err();
        assert!(matches!(
            err,
            PlayerError::IndexOutOfRange { given: 3, len: 2 }
        ));
        assert_eq!(titles(&queue), vec!["a", "b"]);
    }

    #[test]
    fn remove_shifts_following_entries_left() {
        let mut queue = queue_of(&["a", "b", "c"]);
        let removed = queue.remove_at(1).unwrap();
        assert_eq!(removed.title(), "b");
        assert_eq!(queue.len(), 2);
        assert_eq!(titles(&queue), vec!["a", "c"]);
    }

    #[test]
    fn remove_out_of_range_reports_and_keeps_queue() {
        let mut queue = queue_of(&["a"]);
        let err = queue.remove_at(5).unwrap_err();
        assert!(matches!(
            err,
            PlayerError::IndexOutOfRange { given: 6, len: 1 }
        ));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn move_to_front_reinserts_at_position_zero() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.move_to_front(2).unwrap();
        assert_eq!(titles(&queue), vec!["c", "a", "b"]);
    }

    #[test]
    fn shuffle_is_a_permutation_of_the_same_entries() {
        let titles_in: Vec<String> = (0..32).map(|i| format!("track-{i}")).collect();
        let mut queue = SessionQueue::new();
        for title in &titles_in {
            queue.enqueue(entry(title));
        }

        queue.shuffle();

        let after: HashSet<String> = titles(&queue).into_iter().collect();
        let expected: HashSet<String> = titles_in.into_iter().collect();
        assert_eq!(queue.len(), 32);
        assert_eq!(after, expected);
    }

    #[test]
    fn title_at_reads_without_mutating() {
        let queue = queue_of(&["a", "b"]);
        assert_eq!(queue.title_at(1).unwrap(), "b");
        assert!(queue.title_at(2).is_err());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn snapshot_is_a_point_in_time_copy() {
        let mut queue = queue_of(&["a", "b"]);
        let snapshot = queue.snapshot();
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].title(), "a");
    }

    #[test]
    fn clear_empties_the_queue() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }
}
