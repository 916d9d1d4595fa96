use slotmap::{DefaultKey, Key, KeyData, SlotMap};

/// 带引用计数的句柄表，后端用它把不透明的 `u64` 句柄映射到真正的对象
///
/// 句柄由 slotmap 的 key 编码而来，带有代际信息，已经销毁的句柄不会被误认
pub struct HandleTable<T> {
    objects: SlotMap<DefaultKey, HandleEntry<T>>,
}

struct HandleEntry<T> {
    ref_count: u32,
    object: T,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            objects: SlotMap::with_key(),
        }
    }

    #[inline]
    fn key(raw: u64) -> DefaultKey {
        KeyData::from_ffi(raw).into()
    }

    /// 插入一个对象，初始引用计数为 1
    pub fn insert(&mut self, object: T) -> u64 {
        self.objects.insert(HandleEntry { ref_count: 1, object }).data().as_ffi()
    }

    #[inline]
    pub fn get(&self, raw: u64) -> Option<&T> {
        self.objects.get(Self::key(raw)).map(|e| &e.object)
    }

    #[inline]
    pub fn get_mut(&mut self, raw: u64) -> Option<&mut T> {
        self.objects.get_mut(Self::key(raw)).map(|e| &mut e.object)
    }

    #[inline]
    pub fn ref_count(&self, raw: u64) -> Option<u32> {
        self.objects.get(Self::key(raw)).map(|e| e.ref_count)
    }

    /// 返回新的引用计数，句柄无效时返回 None
    pub fn add_ref(&mut self, raw: u64) -> Option<u32> {
        let entry = self.objects.get_mut(Self::key(raw))?;
        entry.ref_count += 1;
        Some(entry.ref_count)
    }

    /// 返回剩余的引用计数；归零时对象从表中移除并返回给调用方销毁
    pub fn release(&mut self, raw: u64) -> Option<(u32, Option<T>)> {
        let key = Self::key(raw);
        let entry = self.objects.get_mut(key)?;
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return Some((entry.ref_count, None));
        }
        self.objects.remove(key).map(|e| (0, Some(e.object)))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &T)> {
        self.objects.iter().map(|(k, e)| (k.data().as_ffi(), &e.object))
    }
}
