//! Индексируемая коллекция примеров.
//!
//! [`Dataset`] — минимальный интерфейс, через который загрузчик батчей
//! обращается к данным, не зная конкретной реализации.

use crate::error::BirdResult;

/// Индексируемый датасет.
///
/// # Пример
/// ```ignore
/// let dataset = registry.get_dataset("train_simple")?;
/// for idx in 0..dataset.len() {
///     let item = dataset.get(idx)?;
///     println!("{} -> {}", item.filename.display(), item.label);
/// }
/// ```
pub trait Dataset: Send + Sync {
    /// Тип возвращаемого элемента.
    type Item;

    /// Количество элементов.
    fn len(&self) -> usize;

    /// `true`, если датасет пуст.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Получить элемент по индексу.
    ///
    /// # Ошибки
    /// Индекс вне диапазона или ошибка загрузки/обработки элемента.
    fn get(&self, index: usize) -> BirdResult<Self::Item>;
}
