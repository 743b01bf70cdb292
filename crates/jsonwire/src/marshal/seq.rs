//! Marshaling for sequences, options, and pointer-like containers.

use std::any::type_name;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{Action, Error, SemanticError};
use crate::marshal::{
    FieldFormat, MarshalJson, MarshalState, PtrKind, UnmarshalJson, UnmarshalState,
};
use crate::token::{Kind, Token};

fn mismatch<T: ?Sized>(kind: Kind) -> Error {
    SemanticError::new(Action::Unmarshal, type_name::<T>()).with_kind(kind).into()
}

/// Accepts the absent-collection formats and rejects everything else.
fn seq_format<T: ?Sized>(st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
    match st.take_format() {
        None | Some(FieldFormat::EmitNull | FieldFormat::EmitEmpty) => Ok(()),
        Some(f) => Err(SemanticError::new(Action::Marshal, type_name::<T>())
            .with_reason(format!("format {:?} not applicable", f.name()))
            .into()),
    }
}

impl<T: MarshalJson> MarshalJson for Vec<T> {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        seq_format::<Vec<T>>(st)?;
        marshal_elements(self.as_slice(), st)
    }

    fn json_is_zero(&self) -> bool {
        self.is_empty()
    }

    fn marshal_json_absent(st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        let format = st.take_format();
        let as_null = match format {
            Some(FieldFormat::EmitNull) => true,
            Some(FieldFormat::EmitEmpty) => false,
            _ => st.opts.format_nil_slice_as_null,
        };
        if as_null {
            st.enc.write_token(&Token::NULL)
        } else {
            st.enc.write_token(&Token::ARRAY_START)?;
            st.enc.write_token(&Token::ARRAY_END)
        }
    }
}

impl<T: MarshalJson> MarshalJson for [T] {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        seq_format::<[T]>(st)?;
        marshal_elements(self, st)
    }

    fn json_is_zero(&self) -> bool {
        self.is_empty()
    }
}

fn marshal_elements<T: MarshalJson>(
    elems: &[T],
    st: &mut MarshalState<'_, '_>,
) -> Result<(), Error> {
    // Empty slices share a dangling sentinel pointer; only a non-empty
    // slice has an identity worth tracking.
    let key = (PtrKind::Seq, elems.as_ptr() as usize);
    let entered = if elems.is_empty() { false } else { st.enter_cycle(key, "slice")? };
    let result = (|| {
        st.enc.write_token(&Token::ARRAY_START)?;
        for e in elems {
            e.marshal_json(st)?;
        }
        st.enc.write_token(&Token::ARRAY_END)
    })();
    st.exit_cycle(key, entered);
    result
}

impl<T: UnmarshalJson + Default> UnmarshalJson for Vec<T> {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        let _ = st.take_format();
        if st.dec.peek_kind() == Kind::NULL {
            st.dec.read_token()?;
            self.clear();
            return Ok(());
        }
        let kind = st.dec.read_token()?.kind();
        if kind != Kind::ARRAY_START {
            return Err(mismatch::<Vec<T>>(kind));
        }
        // Reset to length zero, then append: capacity is reused but prior
        // elements are replaced, not merged.
        self.clear();
        loop {
            if st.dec.peek_kind() == Kind::ARRAY_END {
                st.dec.read_token()?;
                return Ok(());
            }
            let mut elem = T::default();
            elem.unmarshal_json(st)?;
            self.push(elem);
        }
    }
}

impl<T: MarshalJson, const N: usize> MarshalJson for [T; N] {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        seq_format::<[T; N]>(st)?;
        marshal_elements(self.as_slice(), st)
    }

    fn json_is_zero(&self) -> bool {
        self.iter().all(MarshalJson::json_is_zero)
    }
}

impl<T: UnmarshalJson + Default, const N: usize> UnmarshalJson for [T; N] {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        let _ = st.take_format();
        if st.dec.peek_kind() == Kind::NULL {
            st.dec.read_token()?;
            for slot in self.iter_mut() {
                *slot = T::default();
            }
            return Ok(());
        }
        let kind = st.dec.read_token()?.kind();
        if kind != Kind::ARRAY_START {
            return Err(mismatch::<[T; N]>(kind));
        }
        for slot in self.iter_mut() {
            if st.dec.peek_kind() == Kind::ARRAY_END {
                return Err(SemanticError::new(Action::Unmarshal, type_name::<[T; N]>())
                    .with_kind(Kind::ARRAY_START)
                    .with_reason("too few array elements")
                    .into());
            }
            slot.unmarshal_json(st)?;
        }
        if st.dec.peek_kind() != Kind::ARRAY_END {
            return Err(SemanticError::new(Action::Unmarshal, type_name::<[T; N]>())
                .with_kind(Kind::ARRAY_START)
                .with_reason("too many array elements")
                .into());
        }
        st.dec.read_token()?;
        Ok(())
    }
}

impl<T: MarshalJson> MarshalJson for Option<T> {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        match self {
            Some(v) => v.marshal_json(st),
            None => T::marshal_json_absent(st),
        }
    }

    fn json_is_zero(&self) -> bool {
        self.is_none()
    }
}

impl<T: UnmarshalJson + Default> UnmarshalJson for Option<T> {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        if st.dec.peek_kind() == Kind::NULL {
            let _ = st.take_format();
            st.dec.read_token()?;
            *self = None;
            return Ok(());
        }
        match self {
            // Merge into the present value.
            Some(v) => v.unmarshal_json(st),
            None => {
                let mut v = T::default();
                v.unmarshal_json(st)?;
                *self = Some(v);
                Ok(())
            }
        }
    }
}

impl<T: MarshalJson + ?Sized> MarshalJson for Box<T> {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        let key = (PtrKind::Ptr, std::ptr::from_ref::<T>(&**self).cast::<()>() as usize);
        let entered = st.enter_cycle(key, type_name::<Box<T>>())?;
        let result = (**self).marshal_json(st);
        st.exit_cycle(key, entered);
        result
    }

    fn json_is_zero(&self) -> bool {
        (**self).json_is_zero()
    }
}

impl<T: UnmarshalJson + ?Sized> UnmarshalJson for Box<T> {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        (**self).unmarshal_json(st)
    }
}

macro_rules! impl_shared_ptr {
    ($ptr:ident, $make_mut_bound:path) => {
        impl<T: MarshalJson> MarshalJson for $ptr<T> {
            fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
                let key = (PtrKind::Ptr, $ptr::as_ptr(self) as usize);
                let entered = st.enter_cycle(key, type_name::<$ptr<T>>())?;
                let result = (**self).marshal_json(st);
                st.exit_cycle(key, entered);
                result
            }

            fn json_is_zero(&self) -> bool {
                (**self).json_is_zero()
            }
        }

        impl<T: UnmarshalJson + $make_mut_bound> UnmarshalJson for $ptr<T> {
            fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
                $ptr::make_mut(self).unmarshal_json(st)
            }
        }
    };
}

impl_shared_ptr!(Rc, Clone);
impl_shared_ptr!(Arc, Clone);

impl<T: MarshalJson> MarshalJson for RefCell<T> {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        match self.try_borrow() {
            Ok(inner) => inner.marshal_json(st),
            Err(_) => Err(SemanticError::new(Action::Marshal, type_name::<RefCell<T>>())
                .with_reason("value is mutably borrowed")
                .into()),
        }
    }

    fn json_is_zero(&self) -> bool {
        self.try_borrow().is_ok_and(|inner| inner.json_is_zero())
    }
}

impl<T: UnmarshalJson> UnmarshalJson for RefCell<T> {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        self.get_mut().unmarshal_json(st)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{marshal, marshal_with, unmarshal, unmarshal_into, MarshalOptions};

    #[test]
    fn vectors_round_trip() {
        let v = vec![vec![1_i32], vec![], vec![2, 3]];
        let out = marshal(&v).unwrap();
        assert_eq!(out, b"[[1],[],[2,3]]");
        let back: Vec<Vec<i32>> = unmarshal(&out).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn unmarshal_resets_length() {
        let mut v = vec![9_i32, 9, 9, 9];
        unmarshal_into(b"[1,2]", &mut v).unwrap();
        assert_eq!(v, [1, 2]);
    }

    #[test]
    fn array_length_mismatches() {
        let ok: [i32; 3] = unmarshal(b"[1,2,3]").unwrap();
        assert_eq!(ok, [1, 2, 3]);
        let err = unmarshal::<[i32; 3]>(b"[1,2]").unwrap_err();
        assert!(err.to_string().contains("too few"), "{err}");
        let err = unmarshal::<[i32; 3]>(b"[1,2,3,4]").unwrap_err();
        assert!(err.to_string().contains("too many"), "{err}");
    }

    #[test]
    fn options_clear_and_merge() {
        let mut v: Option<i32> = Some(5);
        unmarshal_into(b"null", &mut v).unwrap();
        assert_eq!(v, None);
        unmarshal_into(b"7", &mut v).unwrap();
        assert_eq!(v, Some(7));
    }

    #[test]
    fn absent_collections_render_per_options() {
        let none: Option<Vec<i32>> = None;
        assert_eq!(marshal(&none).unwrap(), b"[]");
        let opts =
            MarshalOptions { format_nil_slice_as_null: true, ..MarshalOptions::default() };
        assert_eq!(marshal_with(&none, &opts).unwrap(), b"null");
        let none: Option<i32> = None;
        assert_eq!(marshal(&none).unwrap(), b"null");
    }

    #[test]
    fn shared_pointers_round_trip() {
        let v = Rc::new(RefCell::new(vec![1_i32, 2]));
        assert_eq!(marshal(&v).unwrap(), b"[1,2]");
        let mut target: Rc<RefCell<Vec<i32>>> = Rc::default();
        unmarshal_into(b"[3]", &mut target).unwrap();
        assert_eq!(*target.borrow(), [3]);
    }

    #[test]
    fn deep_cycles_error_instead_of_overflowing() {
        #[derive(Default)]
        struct Node {
            next: Option<Rc<RefCell<Node>>>,
        }
        impl MarshalJson for Node {
            fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
                st.enc.write_token(&Token::OBJECT_START)?;
                st.enc.write_token(&Token::string("next"))?;
                self.next.marshal_json(st)?;
                st.enc.write_token(&Token::OBJECT_END)
            }
        }
        let a = Rc::new(RefCell::new(Node::default()));
        let b = Rc::new(RefCell::new(Node { next: Some(Rc::clone(&a)) }));
        a.borrow_mut().next = Some(Rc::clone(&b));
        let err = marshal(&a).unwrap_err();
        assert!(err.to_string().contains("cycle"), "{err}");
    }
}
